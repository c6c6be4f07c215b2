//! PlayLog core
//!
//! Turns the on-disk state of a Serato DJ library (binary crate files plus
//! text session history logs) into one time-ordered play timeline with a
//! confidence and provenance tag on every event.
//!
//! The pipeline is stateless per invocation: [`extract_timeline`] reads the
//! library fresh, decodes every candidate file in parallel, reconciles the
//! two source types, and returns a [`Timeline`]. Malformed files degrade to
//! partial results with warnings; only a bad root or a completely unusable
//! source aborts the run.

pub mod pipeline;
pub mod services;

pub use playlog_common::config::{ExtractRequest, Mode};
pub use playlog_common::error::{Error, ErrorReport, ParseError, Result, Warning, WarningKind};
pub use playlog_common::models::{
    PlayEvent, PlayTime, ResolvedMode, SessionSummary, Timeline, Track, TrackKey,
};

/// Extract the play timeline for one request.
pub fn extract_timeline(request: &ExtractRequest) -> Result<Timeline> {
    pipeline::run(request)
}
