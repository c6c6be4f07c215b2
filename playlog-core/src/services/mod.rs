//! Pipeline services
//!
//! Each service is a pure transformation over values produced by the previous
//! stage; none of them hold state between invocations.

pub mod crate_parser;
pub mod log_parser;
pub mod mode_resolver;
pub mod source_locator;
pub mod timeline_builder;
pub mod timeline_estimator;
