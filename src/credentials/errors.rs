//! # Credential Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for credential operations
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Credential retrieval errors
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Secret name is empty")]
    EmptySecretName,

    #[error("Invalid secret name: {0}")]
    InvalidSecretName(String),

    #[error("Secret not found: {name} (looked in {path})")]
    SecretNotFound { name: String, path: PathBuf },

    #[error("Failed to read secret at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Secret value for key '{0}' is not valid UTF-8")]
    NonUtf8Value(String),
}
