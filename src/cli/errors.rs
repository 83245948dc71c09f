//! CLI-specific error types
//!
//! All CLI errors are fatal: the process exits with status 1.

use std::fmt;
use std::io;

use crate::observability::LoggingError;
use crate::restore::RestoreError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Invalid or missing configuration
    ConfigError,
    /// I/O error (stdout, runtime setup)
    IoError,
    /// Log subscriber could not be installed
    LoggingError,
    /// The restore itself failed
    RestoreFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "RESTORE_CLI_CONFIG_ERROR",
            Self::IoError => "RESTORE_CLI_IO_ERROR",
            Self::LoggingError => "RESTORE_CLI_LOGGING_ERROR",
            Self::RestoreFailed => "RESTORE_CLI_RESTORE_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Restore failed; the message carries the restore error code
    pub fn restore_failed(err: &RestoreError) -> Self {
        Self::new(CliErrorCode::RestoreFailed, err.to_string())
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        Self::new(CliErrorCode::LoggingError, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_has_code_and_message() {
        let err = CliError::config_error("no worker name");
        assert_eq!(err.to_string(), "RESTORE_CLI_CONFIG_ERROR: no worker name");
    }

    #[test]
    fn test_restore_failure_keeps_restore_code() {
        let err = CliError::restore_failed(&RestoreError::no_archives_found());
        assert_eq!(err.code(), &CliErrorCode::RestoreFailed);
        assert!(err.message().contains("RESTORE_NO_ARCHIVES_FOUND"));
    }
}
