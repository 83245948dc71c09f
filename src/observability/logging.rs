//! Logging initialisation
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the configured
//! default level.

use std::io;

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable lines
    Text,
}

/// Logging setup failure
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directives}': {source}")]
    InvalidFilter {
        directives: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_logging(format: LogFormat, default_level: &str) -> Result<(), LoggingError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(rust_log.as_deref(), default_level)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| LoggingError::Install(e.to_string()))
}

/// Pick the filter directives, `RUST_LOG` winning over the default level
fn filter_directives<'a>(rust_log: Option<&'a str>, default_level: &'a str) -> &'a str {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => directives,
        _ => default_level,
    }
}

fn build_filter(rust_log: Option<&str>, default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = filter_directives(rust_log, default_level);
    EnvFilter::try_new(directives).map_err(|source| LoggingError::InvalidFilter {
        directives: directives.to_string(),
        source,
    })
}
