//! Extraction pipeline
//!
//! One invocation runs: locate sources, decode every file in parallel, merge
//! the per-file results deterministically (ordered by source path), resolve
//! the authoritative mode, then estimate and assemble the timeline. Per-file
//! parse failures never abort the run; they become warnings at the worker
//! boundary and sibling files are unaffected. Only configuration problems and
//! an unavailable source fail the whole invocation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{debug, info};

use playlog_common::config::ExtractRequest;
use playlog_common::error::{Error, Result, Warning};
use playlog_common::models::{
    PlayEvent, ResolvedMode, SeratoCrate, SessionLog, Timeline, Track, TrackKey,
};

use crate::services::crate_parser::{self, CrateParseResult};
use crate::services::log_parser::{self, LogParseResult};
use crate::services::mode_resolver::{self, AvailableSources};
use crate::services::timeline_estimator::{self, ExactTimes};
use crate::services::{source_locator, timeline_builder};

/// Run one extraction end to end.
pub fn run(request: &ExtractRequest) -> Result<Timeline> {
    let root = request.resolve_root()?;
    info!(root = %root.display(), mode = %request.mode, "starting extraction");

    let located = source_locator::locate(&root, request.mode)?;
    let mut warnings = located.warnings;
    let sources = located.value;
    debug!(
        crates = sources.crates.len(),
        logs = sources.logs.len(),
        "located sources"
    );

    // Parallel decode. `par_iter().map().collect()` preserves input order, so
    // the reduction below is deterministic regardless of worker scheduling.
    let crate_results: Vec<(PathBuf, Result<CrateParseResult>)> = sources
        .crates
        .par_iter()
        .map(|path| {
            (
                path.clone(),
                crate_parser::parse_crate_file(path, request.parse_timeout),
            )
        })
        .collect();
    let log_results: Vec<(PathBuf, Result<LogParseResult>)> = sources
        .logs
        .par_iter()
        .map(|path| {
            (
                path.clone(),
                log_parser::parse_log_file(path, request.parse_timeout),
            )
        })
        .collect();

    let mut tracks: BTreeMap<TrackKey, Track> = BTreeMap::new();
    let mut crates: Vec<SeratoCrate> = Vec::new();
    let mut logs: Vec<SessionLog> = Vec::new();

    for (path, result) in crate_results {
        match result {
            Ok(parsed) => {
                if let Some(error) = &parsed.error {
                    warnings.push(Warning::parse(error));
                }
                absorb_tracks(&mut tracks, parsed.tracks);
                crates.push(parsed.crate_file);
            }
            Err(error) => warnings.push(failure_warning(&path, error)),
        }
    }
    for (path, result) in log_results {
        match result {
            Ok(parsed) => {
                if let Some(error) = &parsed.error {
                    warnings.push(Warning::parse(error));
                }
                absorb_tracks(&mut tracks, parsed.tracks);
                logs.push(parsed.log);
            }
            Err(error) => warnings.push(failure_warning(&path, error)),
        }
    }

    let available = AvailableSources {
        parsed_crates: crates.len(),
        parsed_logs: logs.len(),
        log_entries: logs.iter().map(|log| log.entries.len()).sum(),
    };
    let resolved = mode_resolver::resolve(request.mode, request.timeline_estimate, available)?;

    let candidates = match resolved {
        ResolvedMode::UsingLogs => log_candidates(&logs),
        ResolvedMode::UsingCrateWithEstimation => {
            estimated_candidates(&crates, &logs, &tracks, request)
        }
        ResolvedMode::UsingCrate => crates
            .iter()
            .flat_map(|crate_file| {
                let session_id = log_parser::session_id_from_path(&crate_file.source);
                timeline_estimator::untimed(crate_file, &session_id)
            })
            .collect(),
    };

    // the result only carries metadata its events actually reference
    retain_referenced(&mut tracks, &candidates);

    let timeline = timeline_builder::build(
        candidates,
        tracks,
        resolved,
        request.dedup_tolerance,
        warnings,
    );
    info!(
        events = timeline.events.len(),
        resolved = ?timeline.resolved_mode,
        complete = timeline.complete,
        warnings = timeline.warnings.len(),
        "extraction finished"
    );
    Ok(timeline)
}

/// Exact events straight from log records, in file order.
fn log_candidates(logs: &[SessionLog]) -> Vec<PlayEvent> {
    logs.iter()
        .flat_map(|log| &log.entries)
        .map(|entry| {
            PlayEvent::exact(
                entry.track.clone(),
                entry.played_at,
                Some(entry.session_id.clone()),
                entry.deck.clone(),
            )
        })
        .collect()
}

/// Estimated events for every crate, correlated against whatever log records
/// decoded. Exact timestamps are consumed across crates in path order so the
/// same log record never times two crate entries.
fn estimated_candidates(
    crates: &[SeratoCrate],
    logs: &[SessionLog],
    tracks: &BTreeMap<TrackKey, Track>,
    request: &ExtractRequest,
) -> Vec<PlayEvent> {
    let mut exact = ExactTimes::from_logs(logs, tracks);
    let mut candidates = Vec::new();
    for crate_file in crates {
        let session_id = log_parser::session_id_from_path(&crate_file.source);
        let anchor = anchor_for(crate_file, &exact, tracks, request);
        candidates.extend(timeline_estimator::estimate(
            crate_file,
            tracks,
            &mut exact,
            anchor,
            request.default_track_duration,
            &session_id,
        ));
    }
    candidates
}

/// Anchor precedence: earliest correlated log time, then the caller-supplied
/// anchor, then a date embedded in the crate's file name, then epoch zero.
fn anchor_for(
    crate_file: &SeratoCrate,
    exact: &ExactTimes,
    tracks: &BTreeMap<TrackKey, Track>,
    request: &ExtractRequest,
) -> DateTime<Utc> {
    exact
        .earliest_for(crate_file, tracks)
        .or(request.anchor)
        .or_else(|| log_parser::anchor_hint_from_filename(&crate_file.source))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// First parse of a key wins; crates decode before logs, so richer crate
/// metadata shadows log placeholders for the same key.
fn absorb_tracks(map: &mut BTreeMap<TrackKey, Track>, tracks: Vec<Track>) {
    for track in tracks {
        map.entry(track.key.clone()).or_insert(track);
    }
}

fn retain_referenced(tracks: &mut BTreeMap<TrackKey, Track>, candidates: &[PlayEvent]) {
    let referenced: std::collections::BTreeSet<&TrackKey> =
        candidates.iter().map(|event| &event.track).collect();
    tracks.retain(|key, _| referenced.contains(key));
}

/// Whole-file failures become source warnings; structural parse failures keep
/// their offset detail.
fn failure_warning(path: &Path, error: Error) -> Warning {
    match error {
        Error::Parse(parse_error) => Warning::parse(&parse_error),
        other => Warning::source(path.to_path_buf(), other.to_string()),
    }
}
