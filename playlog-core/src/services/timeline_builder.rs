//! Timeline assembly
//!
//! Merges play-event candidates from the resolved source(s) into the final
//! timeline: collapse duplicate records, sort by start time (stable, so ties
//! keep source order), compute the completeness flag, and roll events up into
//! per-session summaries.
//!
//! Duplicate collapse happens in source order, before sorting: two records
//! are one play only when the same track repeats with timestamps inside the
//! tolerance window and nothing different was recorded between them. A
//! genuine back-to-back replay (or any intervening track) survives.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tracing::debug;

use playlog_common::error::Warning;
use playlog_common::models::{
    PlayEvent, PlayTime, ResolvedMode, SessionSummary, Timeline, Track, TrackKey,
};

/// Assemble the final timeline from candidate events in source order.
pub fn build(
    candidates: Vec<PlayEvent>,
    tracks: BTreeMap<TrackKey, Track>,
    resolved_mode: ResolvedMode,
    dedup_tolerance: Duration,
    mut warnings: Vec<Warning>,
) -> Timeline {
    // An estimated timeline is monotonic by construction; going backwards
    // means a correlated exact timestamp disagreed with crate order. Report
    // it instead of silently resorting.
    if resolved_mode == ResolvedMode::UsingCrateWithEstimation && !is_monotonic(&candidates) {
        warnings.push(Warning::validation(
            "exact timestamps disagree with crate order; timeline re-sorted by start time",
        ));
    }

    let before = candidates.len();
    let mut events = collapse_duplicates(candidates, dedup_tolerance);
    if events.len() < before {
        debug!(collapsed = before - events.len(), "collapsed duplicate records");
    }

    // stable sort keeps source order for ties; untimed events go last
    events.sort_by(|a, b| match (a.time.instant(), b.time.instant()) {
        (Some(ta), Some(tb)) => ta.cmp(&tb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let complete = events.iter().all(|e| e.time.is_exact());
    let estimated = events
        .iter()
        .any(|e| matches!(e.time, PlayTime::Estimated(_)));
    let sessions = summarize_sessions(&events);

    Timeline {
        events,
        tracks,
        resolved_mode,
        estimated,
        complete,
        sessions,
        warnings,
    }
}

fn is_monotonic(events: &[PlayEvent]) -> bool {
    let mut timed = events.iter().filter_map(|e| e.time.instant());
    let Some(mut last) = timed.next() else {
        return true;
    };
    for at in timed {
        if at < last {
            return false;
        }
        last = at;
    }
    true
}

/// Collapse duplicate records in source order, keeping the higher-confidence
/// copy (earlier one on a tie).
fn collapse_duplicates(candidates: Vec<PlayEvent>, tolerance: Duration) -> Vec<PlayEvent> {
    let tolerance =
        ChronoDuration::from_std(tolerance).unwrap_or_else(|_| ChronoDuration::zero());
    let mut retained: Vec<PlayEvent> = Vec::with_capacity(candidates.len());

    for event in candidates {
        match retained.last_mut() {
            Some(prev) if is_duplicate(prev, &event, tolerance) => {
                if event.confidence > prev.confidence {
                    *prev = event;
                }
            }
            _ => retained.push(event),
        }
    }

    retained
}

fn is_duplicate(prev: &PlayEvent, event: &PlayEvent, tolerance: ChronoDuration) -> bool {
    prev.track == event.track
        && match (prev.time.instant(), event.time.instant()) {
            (Some(a), Some(b)) => (b - a).abs() <= tolerance,
            // untimed events cannot be told apart from replays
            _ => false,
        }
}

/// Per-session roll-up in first-seen order.
fn summarize_sessions(events: &[PlayEvent]) -> Vec<SessionSummary> {
    let mut order: Vec<String> = Vec::new();
    let mut summaries: BTreeMap<String, SessionSummary> = BTreeMap::new();

    for event in events {
        let Some(session_id) = &event.session_id else {
            continue;
        };
        let summary = summaries.entry(session_id.clone()).or_insert_with(|| {
            order.push(session_id.clone());
            SessionSummary {
                session_id: session_id.clone(),
                label: session_id.replace('_', " "),
                start: None,
                end: None,
                events: 0,
            }
        });
        summary.events += 1;
        if let Some(at) = event.time.instant() {
            summary.start = Some(summary.start.map_or(at, |s| s.min(at)));
            summary.end = Some(summary.end.map_or(at, |e| e.max(at)));
        }
    }

    order
        .into_iter()
        .filter_map(|id| summaries.remove(&id))
        .collect()
}
