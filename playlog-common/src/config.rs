//! Invocation request and configuration
//!
//! The GUI form state (mode, root path, estimation toggle) maps to a single
//! immutable [`ExtractRequest`] value passed into the core per invocation.
//! There is no live settings object; changing a setting means issuing a new
//! request.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Substitute duration for tracks with unknown/zero length during estimation
pub const DEFAULT_TRACK_DURATION: Duration = Duration::from_secs(60);

/// Window within which two same-track events count as one duplicate record
pub const DEFAULT_DEDUP_TOLERANCE: Duration = Duration::from_secs(5);

/// Which Serato source(s) to consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Prefer session logs (exact timestamps); fall back to crates
    Auto,
    /// Crate files only; timestamps always come from estimation
    Crate,
    /// Session logs only
    Logs,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::Crate => "crate",
            Mode::Logs => "logs",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Mode::Auto),
            "crate" => Ok(Mode::Crate),
            "logs" => Ok(Mode::Logs),
            other => Err(Error::Config(format!(
                "serato mode must be one of auto|crate|logs, got '{other}'"
            ))),
        }
    }
}

/// One immutable invocation of the PlayLog core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRequest {
    /// Serato library root; `None` resolves the platform default
    pub serato_root: Option<PathBuf>,

    /// Requested source mode
    pub mode: Mode,

    /// Whether missing play times may be filled in by estimation
    pub timeline_estimate: bool,

    /// Caller-supplied anchor for estimated timelines
    pub anchor: Option<DateTime<Utc>>,

    /// Duplicate-record collapse window
    pub dedup_tolerance: Duration,

    /// Duration substituted for tracks of unknown length
    pub default_track_duration: Duration,

    /// Optional per-file parse guard against pathological input
    pub parse_timeout: Option<Duration>,
}

impl Default for ExtractRequest {
    fn default() -> Self {
        Self {
            serato_root: None,
            mode: Mode::Auto,
            timeline_estimate: false,
            anchor: None,
            dedup_tolerance: DEFAULT_DEDUP_TOLERANCE,
            default_track_duration: DEFAULT_TRACK_DURATION,
            parse_timeout: None,
        }
    }
}

/// On-disk defaults file (TOML), all keys optional
#[derive(Debug, Clone, Default, Deserialize)]
struct RequestDefaults {
    serato_root: Option<PathBuf>,
    mode: Option<String>,
    timeline_estimate: Option<bool>,
    dedup_tolerance_secs: Option<u64>,
    default_track_duration_secs: Option<u64>,
}

impl ExtractRequest {
    /// Request for a given root with everything else at defaults
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            serato_root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Load request defaults from a TOML file, leaving absent keys at their
    /// built-in defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let defaults: RequestDefaults = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {e}", path.display())))?;

        let mut request = Self::default();
        request.serato_root = defaults.serato_root;
        if let Some(mode) = defaults.mode {
            request.mode = mode.parse()?;
        }
        if let Some(estimate) = defaults.timeline_estimate {
            request.timeline_estimate = estimate;
        }
        if let Some(secs) = defaults.dedup_tolerance_secs {
            request.dedup_tolerance = Duration::from_secs(secs);
        }
        if let Some(secs) = defaults.default_track_duration_secs {
            request.default_track_duration = Duration::from_secs(secs);
        }
        debug!(path = %path.display(), "loaded request defaults");
        Ok(request)
    }

    /// Resolve the effective library root: explicit request value first, then
    /// the platform default location.
    pub fn resolve_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.serato_root {
            return Ok(root.clone());
        }
        default_root().ok_or_else(|| {
            Error::Config("no Serato root supplied and no home directory found".to_string())
        })
    }
}

/// Platform default Serato library root
///
/// Serato keeps its database under `~/Music/_Serato_` on both macOS and
/// Windows; Linux installs (development setups) follow the macOS layout.
pub fn default_root() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Music").join("_Serato_"))
}
