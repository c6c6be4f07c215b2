//! PlayLog domain model
//!
//! All entities are created fresh per invocation from on-disk state and never
//! mutated afterwards; every pipeline stage produces new values. Tracks are
//! owned by the result (`Timeline::tracks`) and referenced by [`TrackKey`]
//! everywhere else, never duplicated by value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Mode;
use crate::error::Warning;

/// Stable track identity
///
/// Derived from the library-assigned id when the source carries one, else the
/// normalized file path, else an artist/title slug. Keys are plain strings so
/// they survive serialization across the invocation boundary unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackKey(String);

impl TrackKey {
    /// Key from a library-assigned track id
    pub fn from_library_id(id: &str) -> Self {
        Self(format!("id:{}", id.trim()))
    }

    /// Key from a file path (absolute or library-relative)
    ///
    /// Backslashes normalize to forward slashes so the same track referenced
    /// from a Windows-written and a macOS-written crate compares equal.
    pub fn from_path(path: &Path) -> Self {
        let normalized = path.to_string_lossy().replace('\\', "/");
        Self(format!("path:{}", normalized.trim_end_matches('/')))
    }

    /// Fallback key from display metadata when no path or id is present
    pub fn from_title_artist(title: &str, artist: &str) -> Self {
        Self(format!(
            "meta:{}|{}",
            artist.trim().to_lowercase(),
            title.trim().to_lowercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A track as parsed from a Serato source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub key: TrackKey,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Source audio file, when the record carried one
    pub file_path: Option<PathBuf>,
    /// `None` when the source had no (or a zero) duration
    pub duration: Option<Duration>,
    pub bpm: Option<f64>,
    /// Musical key as written by Serato (e.g. "8A")
    pub musical_key: Option<String>,
}

impl Track {
    /// Minimal placeholder for a reference with no metadata record
    pub fn placeholder(key: TrackKey, title: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            file_path: None,
            duration: None,
            bpm: None,
            musical_key: None,
        }
    }

    /// Duration if known and non-zero
    pub fn known_duration(&self) -> Option<Duration> {
        self.duration.filter(|d| !d.is_zero())
    }
}

/// Ordered reference to a track within one crate (no timestamp by construction)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrateEntry {
    pub track: TrackKey,
}

/// One decoded crate file: ordered track references, order is meaningful
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeratoCrate {
    /// Crate file this was decoded from
    pub source: PathBuf,
    /// Display name, derived from the file stem
    pub name: String,
    pub entries: Vec<CrateEntry>,
}

impl SeratoCrate {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One timestamped play record from a session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    pub track: TrackKey,
    /// Session the record belongs to (one log may contain several)
    pub session_id: String,
    pub deck: Option<String>,
    /// Exact play timestamp
    pub played_at: DateTime<Utc>,
}

/// One decoded session log file
///
/// Entry order mirrors the file but is not guaranteed meaningful; consumers
/// must sort by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLog {
    pub source: PathBuf,
    pub entries: Vec<SessionLogEntry>,
}

/// Play time with its provenance
///
/// `Exact` carries confidence 1.0 by invariant; `Unknown` models events whose
/// time could not be determined because estimation was disabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "start", rename_all = "lowercase")]
pub enum PlayTime {
    Exact(DateTime<Utc>),
    Estimated(DateTime<Utc>),
    Unknown,
}

impl PlayTime {
    /// The instant, if any
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            PlayTime::Exact(at) | PlayTime::Estimated(at) => Some(*at),
            PlayTime::Unknown => None,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, PlayTime::Exact(_))
    }
}

/// The normalized unit of the final timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub track: TrackKey,
    pub time: PlayTime,
    /// Trustworthiness of the timestamp in [0, 1]; 1.0 iff exact
    pub confidence: f64,
    pub session_id: Option<String>,
    pub deck: Option<String>,
}

impl PlayEvent {
    /// Event with an exact timestamp (confidence pinned to 1.0)
    pub fn exact(
        track: TrackKey,
        at: DateTime<Utc>,
        session_id: Option<String>,
        deck: Option<String>,
    ) -> Self {
        Self {
            track,
            time: PlayTime::Exact(at),
            confidence: 1.0,
            session_id,
            deck,
        }
    }

    /// Event with an estimated timestamp
    pub fn estimated(
        track: TrackKey,
        at: DateTime<Utc>,
        confidence: f64,
        session_id: Option<String>,
    ) -> Self {
        Self {
            track,
            time: PlayTime::Estimated(at),
            confidence: confidence.clamp(0.0, 1.0),
            session_id,
            deck: None,
        }
    }

    /// Event whose time could not be determined (confidence 0)
    pub fn untimed(track: TrackKey, session_id: Option<String>) -> Self {
        Self {
            track,
            time: PlayTime::Unknown,
            confidence: 0.0,
            session_id,
            deck: None,
        }
    }
}

/// Source combination the resolver actually settled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedMode {
    UsingLogs,
    UsingCrate,
    UsingCrateWithEstimation,
}

impl ResolvedMode {
    /// The requested mode family this resolution belongs to
    pub fn source_mode(&self) -> Mode {
        match self {
            ResolvedMode::UsingLogs => Mode::Logs,
            ResolvedMode::UsingCrate | ResolvedMode::UsingCrateWithEstimation => Mode::Crate,
        }
    }
}

/// Per-session roll-up over the final event list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    /// Human-readable label (file stem with separators spaced out)
    pub label: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub events: usize,
}

/// The core's output: one ordered, deduplicated play history
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    /// Events in non-decreasing start-time order; untimed events last
    pub events: Vec<PlayEvent>,
    /// Track metadata owned by this result, referenced by key from events
    pub tracks: BTreeMap<TrackKey, Track>,
    /// What the resolver actually used
    pub resolved_mode: ResolvedMode,
    /// Whether estimation filled in any play time
    pub estimated: bool,
    /// True iff every retained event carries an exact timestamp
    pub complete: bool,
    pub sessions: Vec<SessionSummary>,
    /// Non-fatal findings accumulated across the run
    pub warnings: Vec<Warning>,
}

/// Best-effort value plus the non-fatal issues met while producing it
///
/// The deliberate failure-handling shape of the whole pipeline: a malformed
/// trailing record yields the entries decoded so far and a warning, not an
/// aborted file.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    /// Clean outcome with no findings
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    /// Map the value, keeping the findings
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}
