//! # PlayLog Common Library
//!
//! Shared code for the PlayLog core and its consumers (GUI/IPC/CLI):
//! - Domain model (tracks, crates, session logs, play events, timelines)
//! - Invocation request and configuration types
//! - Error taxonomy and non-fatal warning reports

pub mod config;
pub mod error;
pub mod models;

pub use config::{ExtractRequest, Mode};
pub use error::{Error, ParseError, Result, Warning, WarningKind};
pub use models::{PlayEvent, PlayTime, ResolvedMode, Timeline, Track, TrackKey};
