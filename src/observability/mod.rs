//! Observability subsystem for shard-restore
//!
//! Structured logging through `tracing`:
//! - JSON lines by default, human-readable text on request
//! - One log line = one event
//! - Logs go to stderr; stdout carries only the outcome report
//!
//! # Usage
//!
//! ```ignore
//! use shard_restore::observability::{init_logging, LogFormat};
//!
//! init_logging(LogFormat::Json, "info")?;
//! tracing::info!(ordinal = 3, "resolved worker ordinal");
//! ```

mod logging;

pub use logging::{init_logging, LogFormat, LoggingError};
