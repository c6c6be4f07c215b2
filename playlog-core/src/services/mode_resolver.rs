//! Mode resolution
//!
//! Decides the authoritative source given the requested mode and what the
//! parsers actually produced. Pure and deterministic: same inputs, same
//! resolution. The `auto` ordering is a deliberate precision-over-coverage
//! tie-break — session logs carry exact timestamps, so they always win when
//! any log entry exists.

use tracing::info;

use playlog_common::config::Mode;
use playlog_common::error::{Error, Result};
use playlog_common::models::ResolvedMode;

/// What the parse stage made available, as counts
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailableSources {
    /// Crate files that parsed (fully or partially)
    pub parsed_crates: usize,
    /// Session log files that parsed (fully or partially)
    pub parsed_logs: usize,
    /// Total play records across all parsed logs
    pub log_entries: usize,
}

/// Resolve the source to use for this invocation.
pub fn resolve(
    mode: Mode,
    timeline_estimate: bool,
    available: AvailableSources,
) -> Result<ResolvedMode> {
    let resolved = match mode {
        Mode::Logs => {
            if available.parsed_logs == 0 {
                return Err(Error::UnavailableSource {
                    mode,
                    missing: "logs",
                });
            }
            ResolvedMode::UsingLogs
        }
        Mode::Crate => {
            if available.parsed_crates == 0 {
                return Err(Error::UnavailableSource {
                    mode,
                    missing: "crate",
                });
            }
            crate_resolution(timeline_estimate)
        }
        Mode::Auto => {
            // exact data wins when present; empty logs fall through to crates
            if available.log_entries > 0 {
                ResolvedMode::UsingLogs
            } else if available.parsed_crates > 0 {
                crate_resolution(timeline_estimate)
            } else {
                return Err(Error::UnavailableSource {
                    mode,
                    missing: "crate or logs",
                });
            }
        }
    };

    info!(requested = %mode, resolved = ?resolved, "resolved source mode");
    Ok(resolved)
}

/// Crates never carry timestamps, so the estimation toggle picks the variant.
fn crate_resolution(timeline_estimate: bool) -> ResolvedMode {
    if timeline_estimate {
        ResolvedMode::UsingCrateWithEstimation
    } else {
        ResolvedMode::UsingCrate
    }
}
