//! Common error types for PlayLog
//!
//! Two shapes exist side by side: fatal [`Error`] values that abort an
//! invocation (bad root, no usable source), and non-fatal [`Warning`] values
//! that ride along with a best-effort result (partial parses, post-merge
//! validation findings). Both carry enough machine-readable context for a
//! consumer to render a precise message without inspecting internal state.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::Mode;

/// Common result type for PlayLog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors aborting a whole invocation
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error (bad/missing library root)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested mode demands a source type with no usable data
    #[error("No usable {missing} source for mode '{mode}'")]
    UnavailableSource {
        /// Mode that was requested
        mode: Mode,
        /// Source type that had no candidates ("crate" or "logs")
        missing: &'static str,
    },

    /// Structural corruption in a source file
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable kind tag
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::UnavailableSource { .. } => "unavailable_source",
            Error::Parse(_) => "parse",
            Error::Io(_) => "io",
        }
    }

    /// Structured report for the IPC boundary
    pub fn report(&self) -> ErrorReport {
        let (path, offset, mode) = match self {
            Error::Parse(e) => (Some(e.path.clone()), Some(e.offset), None),
            Error::UnavailableSource { mode, .. } => (None, None, Some(mode.to_string())),
            _ => (None, None, None),
        };
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            path,
            offset,
            mode,
        }
    }
}

/// Structural parse failure with byte-level context
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("Parse error in {} at offset {offset}: expected {expected}, found {found}", path.display())]
pub struct ParseError {
    /// File the failure occurred in
    pub path: PathBuf,
    /// Byte offset of the offending record
    pub offset: u64,
    /// What the parser required at that offset
    pub expected: String,
    /// What was actually present
    pub found: String,
}

impl ParseError {
    pub fn new(
        path: impl Into<PathBuf>,
        offset: u64,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            offset,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Serializable error report returned across the invocation boundary
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Category of a non-fatal finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningKind {
    /// A file was structurally corrupt; leading entries were still used
    Parse,
    /// Post-merge anomaly (e.g. non-monotonic input order)
    Validation,
    /// A candidate source file was skipped (unreadable, empty)
    Source,
}

/// Non-fatal issue attached to a still-returned result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl Warning {
    /// Warning for a partial parse result
    pub fn parse(error: &ParseError) -> Self {
        Self {
            kind: WarningKind::Parse,
            message: error.to_string(),
            path: Some(error.path.clone()),
            offset: Some(error.offset),
        }
    }

    /// Warning for a post-merge validation finding
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Validation,
            message: message.into(),
            path: None,
            offset: None,
        }
    }

    /// Warning for a skipped source file
    pub fn source(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Source,
            message: message.into(),
            path: Some(path.into()),
            offset: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_message_carries_offset_and_context() {
        let err = ParseError::new("/tmp/a.crate", 42, "record header", "end of file");
        let msg = err.to_string();
        assert!(msg.contains("offset 42"));
        assert!(msg.contains("record header"));
        assert!(msg.contains("end of file"));
    }

    #[test]
    fn report_exposes_mode_for_unavailable_source() {
        let err = Error::UnavailableSource {
            mode: Mode::Logs,
            missing: "logs",
        };
        let report = err.report();
        assert_eq!(report.kind, "unavailable_source");
        assert_eq!(report.mode.as_deref(), Some("logs"));
        assert!(report.path.is_none());
    }

    #[test]
    fn report_exposes_offset_for_parse_errors() {
        let err = Error::from(ParseError::new("/tmp/a.crate", 16, "payload of 8 bytes", "4 bytes"));
        let report = err.report();
        assert_eq!(report.kind, "parse");
        assert_eq!(report.offset, Some(16));
    }
}
