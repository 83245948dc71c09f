//! # Object Store Errors

use std::io;

use thiserror::Error;

use crate::credentials::CredentialError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Object store errors
#[derive(Debug, Error)]
pub enum StoreError {
    // Configuration errors
    #[error("Invalid bucket URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("No store driver registered for scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("Invalid credentials: {0}")]
    Credential(#[from] CredentialError),

    // Object errors
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    // Transport errors
    #[error("Object store error: {0}")]
    Backend(#[source] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<object_store::Error> for StoreError {
    fn from(e: object_store::Error) -> Self {
        match e {
            object_store::Error::NotFound { path, .. } => StoreError::ObjectNotFound(path),
            other => StoreError::Backend(other),
        }
    }
}

impl StoreError {
    pub(crate) fn invalid_uri(uri: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }

    /// Wrap as an `io::Error` for use inside `Read` implementations
    pub(crate) fn into_io(self) -> io::Error {
        match self {
            StoreError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_mapped() {
        let err = StoreError::from(object_store::Error::NotFound {
            path: "a/b.tar.gz".to_string(),
            source: "missing".into(),
        });
        assert!(matches!(err, StoreError::ObjectNotFound(ref p) if p == "a/b.tar.gz"));
    }

    #[test]
    fn test_cancel_survives_io_wrapping() {
        let io_err = StoreError::Cancelled.into_io();
        let inner = io_err.into_inner().unwrap();
        assert!(matches!(
            inner.downcast_ref::<StoreError>(),
            Some(StoreError::Cancelled)
        ));
    }
}
