//! # Mounted Secret Directory
//!
//! Reads a secret mounted as a directory, one file per key. This is the
//! layout produced by a Kubernetes secret volume: `<root>/<secret>/<key>`,
//! where each key is a symlink into a hidden `..data` directory.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{CredentialError, CredentialResult};
use super::{CredentialSource, Credentials};

/// Credential source backed by mounted secret directories
#[derive(Debug, Clone)]
pub struct SecretDirectory {
    root: PathBuf,
}

impl SecretDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn secret_path(&self, secret_name: &str) -> CredentialResult<PathBuf> {
        if secret_name.is_empty() {
            return Err(CredentialError::EmptySecretName);
        }
        if secret_name.contains('/') || secret_name == "." || secret_name == ".." {
            return Err(CredentialError::InvalidSecretName(secret_name.to_string()));
        }
        Ok(self.root.join(secret_name))
    }
}

impl CredentialSource for SecretDirectory {
    fn get_credentials(&self, secret_name: &str) -> CredentialResult<Credentials> {
        let dir = self.secret_path(secret_name)?;

        if !dir.is_dir() {
            return Err(CredentialError::SecretNotFound {
                name: secret_name.to_string(),
                path: dir,
            });
        }

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CredentialError::Io { path, source }
        };

        let mut credentials = Credentials::empty();
        for entry in fs::read_dir(&dir).map_err(io_err(&dir))? {
            let entry = entry.map_err(io_err(&dir))?;
            let name = entry.file_name();
            let Some(key) = name.to_str() else {
                continue;
            };
            // Skip the volume's bookkeeping entries (..data, ..2024_01_01...)
            if key.starts_with('.') {
                continue;
            }

            let path = entry.path();
            // Follows the per-key symlink
            let metadata = fs::metadata(&path).map_err(io_err(&path))?;
            if !metadata.is_file() {
                continue;
            }

            let value = fs::read(&path).map_err(io_err(&path))?;
            credentials.insert(key, value);
        }

        Ok(credentials)
    }
}
