//! Timeline estimation
//!
//! Crates carry play order but no timestamps. The estimator walks a crate in
//! order and accumulates start times from track durations: entry *i* starts
//! at `anchor + sum(duration[0..i])`. Durations unknown to the library
//! substitute a configurable default so the walk never stalls, at the price
//! of a lower confidence on that entry. Entries whose track also appears in a
//! correlated session log take that exact timestamp instead and re-anchor the
//! walk from there.
//!
//! Confidence tiers: 1.0 exact, 0.8 estimated from a known duration, 0.5
//! estimated across a defaulted duration, 0.0 when estimation is disabled and
//! no time exists at all.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::debug;

use playlog_common::models::{PlayEvent, SeratoCrate, SessionLog, Track, TrackKey};

/// Confidence of an estimate built on a known track duration
pub const CONFIDENCE_KNOWN_DURATION: f64 = 0.8;

/// Confidence of an estimate that crossed a defaulted (unknown) duration
pub const CONFIDENCE_DEFAULT_DURATION: f64 = 0.5;

/// Exact timestamps recovered from session logs, grouped per track
///
/// Log lines identify tracks only by artist and title, while crate entries
/// usually carry a path or library id, so correlation goes through the
/// normalized metadata key on both sides. Each timestamp is consumed at most
/// once so a track played twice in the crate can pick up two distinct log
/// times in order.
#[derive(Debug, Default)]
pub struct ExactTimes {
    by_track: HashMap<TrackKey, VecDeque<(DateTime<Utc>, Option<String>)>>,
}

impl ExactTimes {
    /// Collect per-track timestamps (with the deck that played them) from
    /// parsed session logs. `log_tracks` supplies artist/title metadata for
    /// the log's own keys.
    pub fn from_logs(logs: &[SessionLog], log_tracks: &BTreeMap<TrackKey, Track>) -> Self {
        let mut by_track: HashMap<TrackKey, Vec<(DateTime<Utc>, Option<String>)>> = HashMap::new();
        for log in logs {
            for entry in &log.entries {
                let key = correlation_key(log_tracks.get(&entry.track), &entry.track);
                by_track
                    .entry(key)
                    .or_default()
                    .push((entry.played_at, entry.deck.clone()));
            }
        }
        let by_track = by_track
            .into_iter()
            .map(|(key, mut times)| {
                times.sort_by_key(|(at, _)| *at);
                (key, times.into())
            })
            .collect();
        Self { by_track }
    }

    /// Earliest exact timestamp among tracks appearing in `crate_file`; the
    /// preferred anchor for that crate.
    pub fn earliest_for(
        &self,
        crate_file: &SeratoCrate,
        tracks: &BTreeMap<TrackKey, Track>,
    ) -> Option<DateTime<Utc>> {
        crate_file
            .entries
            .iter()
            .map(|entry| correlation_key(tracks.get(&entry.track), &entry.track))
            .filter_map(|key| self.by_track.get(&key))
            .filter_map(|times| times.front().map(|(at, _)| *at))
            .min()
    }

    /// Consume the next unclaimed timestamp (and its deck) for `track`.
    fn take(&mut self, track: &TrackKey) -> Option<(DateTime<Utc>, Option<String>)> {
        self.by_track.get_mut(track)?.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.by_track.values().all(VecDeque::is_empty)
    }
}

/// Identity used to match a crate entry against log records: the normalized
/// artist/title key when metadata is known, the entry's own key otherwise.
fn correlation_key(track: Option<&Track>, fallback: &TrackKey) -> TrackKey {
    match track {
        Some(t) => TrackKey::from_title_artist(&t.title, &t.artist),
        None => fallback.clone(),
    }
}

/// Estimate a start time for every entry of `crate_file`.
///
/// The output is monotonically non-decreasing by construction unless a
/// correlated exact timestamp disagrees with crate order; the builder detects
/// and reports that case.
pub fn estimate(
    crate_file: &SeratoCrate,
    tracks: &BTreeMap<TrackKey, Track>,
    exact: &mut ExactTimes,
    anchor: DateTime<Utc>,
    default_duration: Duration,
    session_id: &str,
) -> Vec<PlayEvent> {
    let mut events = Vec::with_capacity(crate_file.entries.len());
    let mut cursor = anchor;
    let default_step =
        ChronoDuration::from_std(default_duration).unwrap_or_else(|_| ChronoDuration::zero());

    for entry in &crate_file.entries {
        let known = tracks
            .get(&entry.track)
            .and_then(Track::known_duration);
        let (duration, confidence) = match known {
            Some(d) => (d, CONFIDENCE_KNOWN_DURATION),
            None => (default_duration, CONFIDENCE_DEFAULT_DURATION),
        };
        let step = ChronoDuration::from_std(duration).unwrap_or(default_step);

        let corr = correlation_key(tracks.get(&entry.track), &entry.track);
        if let Some((at, deck)) = exact.take(&corr) {
            events.push(PlayEvent::exact(
                entry.track.clone(),
                at,
                Some(session_id.to_string()),
                deck,
            ));
            cursor = advance(at, step, default_step);
        } else {
            events.push(PlayEvent::estimated(
                entry.track.clone(),
                cursor,
                confidence,
                Some(session_id.to_string()),
            ));
            cursor = advance(cursor, step, default_step);
        }
    }

    debug!(
        crate_name = %crate_file.name,
        events = events.len(),
        "estimated crate timeline"
    );
    events
}

/// Step the walk forward without ever leaving the representable date range:
/// an absurd duration that would overflow falls back to the default step,
/// then to standing still.
fn advance(from: DateTime<Utc>, step: ChronoDuration, fallback: ChronoDuration) -> DateTime<Utc> {
    from.checked_add_signed(step)
        .or_else(|| from.checked_add_signed(fallback))
        .unwrap_or(from)
}

/// Pass-through for disabled estimation: every entry becomes an untimed event
/// with confidence 0, kept in crate order for the builder to place last.
pub fn untimed(crate_file: &SeratoCrate, session_id: &str) -> Vec<PlayEvent> {
    crate_file
        .entries
        .iter()
        .map(|entry| PlayEvent::untimed(entry.track.clone(), Some(session_id.to_string())))
        .collect()
}
