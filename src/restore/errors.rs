//! Restore-specific error types
//!
//! Restore errors follow a single structured model:
//! - Stable error codes in RESTORE_NAME format
//! - Clear severity levels
//! - No silent failures
//!
//! Every restore error aborts the run. Retries happen by re-invoking the
//! whole process; the completion lock makes that safe.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::Path;

use crate::credentials::CredentialError;
use crate::store::StoreError;

use super::lock::LockNameError;
use super::ordinal::IdentityError;

/// Boxed underlying cause
pub type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Unrecoverable error, the process exits with failure
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Restore error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreErrorCode {
    /// Worker name does not parse
    InvalidIdentity,
    /// No archive left after filtering the bucket listing
    NoArchivesFound,
    /// Worker ordinal is not below the archive count
    OrdinalOutOfRange,
    /// Local recovery folders and remote archives describe different generations
    MismatchedBackupCount,
    /// Filesystem or stream fault
    Io,
    /// Secret fetch failure
    Credential,
    /// Malformed bucket URI, unknown scheme or restore identifier
    InvalidConfig,
    /// Deadline or external abort
    Cancelled,
}

impl RestoreErrorCode {
    /// Returns the stable string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreErrorCode::InvalidIdentity => "RESTORE_INVALID_IDENTITY",
            RestoreErrorCode::NoArchivesFound => "RESTORE_NO_ARCHIVES_FOUND",
            RestoreErrorCode::OrdinalOutOfRange => "RESTORE_ORDINAL_OUT_OF_RANGE",
            RestoreErrorCode::MismatchedBackupCount => "RESTORE_MISMATCHED_BACKUP_COUNT",
            RestoreErrorCode::Io => "RESTORE_IO",
            RestoreErrorCode::Credential => "RESTORE_CREDENTIAL",
            RestoreErrorCode::InvalidConfig => "RESTORE_INVALID_CONFIG",
            RestoreErrorCode::Cancelled => "RESTORE_CANCELLED",
        }
    }

    /// Returns the severity level for this error code
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

impl fmt::Display for RestoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Restore error with full context
#[derive(Debug)]
pub struct RestoreError {
    /// Error code following RESTORE_NAME format
    code: RestoreErrorCode,
    /// Human-readable error message
    message: String,
    /// Optional underlying error
    source: Option<BoxedSource>,
}

impl RestoreError {
    fn new(
        code: RestoreErrorCode,
        message: impl Into<String>,
        source: Option<BoxedSource>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    /// Worker name failed to parse
    pub fn invalid_identity(name: &str, source: IdentityError) -> Self {
        Self::new(
            RestoreErrorCode::InvalidIdentity,
            format!("Invalid worker name '{}', expected <base-name>-<ordinal>", name),
            Some(Box::new(source)),
        )
    }

    /// Bucket listing produced no usable archive
    pub fn no_archives_found() -> Self {
        Self::new(
            RestoreErrorCode::NoArchivesFound,
            "There are no archived backup files in the bucket",
            None,
        )
    }

    /// Ordinal does not index into the backup set
    pub fn ordinal_out_of_range(ordinal: usize, archives: usize) -> Self {
        Self::new(
            RestoreErrorCode::OrdinalOutOfRange,
            format!(
                "Member ordinal {} is not below the number of archived backup files {}",
                ordinal, archives
            ),
            None,
        )
    }

    /// Local folder count differs from the archive count
    pub fn mismatched_backup_count(local: usize, archives: usize) -> Self {
        Self::new(
            RestoreErrorCode::MismatchedBackupCount,
            format!(
                "Mismatching local recovery folder count {} and archived backup file count {}",
                local, archives
            ),
            None,
        )
    }

    /// I/O error during restore
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(RestoreErrorCode::Io, message, Some(Box::new(source)))
    }

    /// I/O error at a specific path
    pub fn io_error_at_path(path: &Path, source: io::Error) -> Self {
        Self::io_error(format!("I/O error at {}", path.display()), source)
    }

    /// Store or stream fault with an arbitrary cause
    pub fn stream(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self::new(RestoreErrorCode::Io, message, Some(source.into()))
    }

    /// Secret could not be read
    pub fn credential(source: CredentialError) -> Self {
        Self::new(
            RestoreErrorCode::Credential,
            "Failed to fetch bucket credentials",
            Some(Box::new(source)),
        )
    }

    /// Configuration rejected before any work starts
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorCode::InvalidConfig, message, None)
    }

    /// Run interrupted by deadline or signal
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorCode::Cancelled, message, None)
    }

    /// Returns the error code
    pub fn code(&self) -> RestoreErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the severity of this error
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Restore errors always terminate the run
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code,
            self.message
        )?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl StdError for RestoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<StoreError> for RestoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Cancelled => Self::cancelled("Object store operation cancelled"),
            StoreError::InvalidUri { .. } | StoreError::UnsupportedScheme(_) => {
                Self::new(RestoreErrorCode::InvalidConfig, e.to_string(), None)
            }
            StoreError::Credential(source) => Self::credential(source),
            other => Self::stream("Object store operation failed", other),
        }
    }
}

impl From<CredentialError> for RestoreError {
    fn from(e: CredentialError) -> Self {
        Self::credential(e)
    }
}

impl From<LockNameError> for RestoreError {
    fn from(e: LockNameError) -> Self {
        Self::new(
            RestoreErrorCode::InvalidConfig,
            format!("Invalid restore lock name: {}", e),
            None,
        )
    }
}

/// Result type for restore operations
pub type RestoreResult<T> = Result<T, RestoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            RestoreErrorCode::InvalidIdentity.as_str(),
            "RESTORE_INVALID_IDENTITY"
        );
        assert_eq!(
            RestoreErrorCode::MismatchedBackupCount.as_str(),
            "RESTORE_MISMATCHED_BACKUP_COUNT"
        );
        assert_eq!(RestoreErrorCode::Io.as_str(), "RESTORE_IO");
        assert_eq!(RestoreErrorCode::Cancelled.as_str(), "RESTORE_CANCELLED");
    }

    #[test]
    fn test_all_errors_are_fatal_severity() {
        let codes = [
            RestoreErrorCode::InvalidIdentity,
            RestoreErrorCode::NoArchivesFound,
            RestoreErrorCode::OrdinalOutOfRange,
            RestoreErrorCode::MismatchedBackupCount,
            RestoreErrorCode::Io,
            RestoreErrorCode::Credential,
            RestoreErrorCode::InvalidConfig,
            RestoreErrorCode::Cancelled,
        ];

        for code in codes {
            assert_eq!(code.severity(), Severity::Fatal);
        }
    }

    #[test]
    fn test_error_display_contains_required_fields() {
        let err = RestoreError::ordinal_out_of_range(4, 3);
        let display = format!("{}", err);

        assert!(display.contains("FATAL"));
        assert!(display.contains("RESTORE_ORDINAL_OUT_OF_RANGE"));
        assert!(display.contains("ordinal 4"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_error_with_source() {
        let io_err = io::Error::new(io::ErrorKind::Other, "disk full");
        let err = RestoreError::io_error("extraction failed", io_err);

        let display = format!("{}", err);
        assert!(display.contains("caused by"));
        assert!(display.contains("disk full"));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn test_store_cancellation_maps_to_cancelled() {
        let err = RestoreError::from(StoreError::Cancelled);
        assert_eq!(err.code(), RestoreErrorCode::Cancelled);
    }

    #[test]
    fn test_unsupported_scheme_maps_to_invalid_config() {
        let err = RestoreError::from(StoreError::UnsupportedScheme("ftp".into()));
        assert_eq!(err.code(), RestoreErrorCode::InvalidConfig);
        assert!(err.message().contains("ftp"));
    }
}
