//! # Local Filesystem Backend
//!
//! Serves a directory tree as a bucket. Keys are paths relative to the root
//! joined with `/`.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use tokio_util::sync::CancellationToken;

use super::backend::{BlobEntry, BlobReader, BlobStore};
use super::errors::{StoreError, StoreResult};

/// Local filesystem bucket
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
    cancel: CancellationToken,
}

impl LocalBackend {
    pub fn new(root: PathBuf, cancel: CancellationToken) -> Self {
        Self { root, cancel }
    }

    fn full_path(&self, key: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn check_cancelled(&self) -> StoreResult<()> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }
}

impl BlobStore for LocalBackend {
    fn list(&self) -> StoreResult<Vec<BlobEntry>> {
        let mut results = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            self.check_cancelled()?;

            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                let file_type = entry.file_type()?;

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                let metadata = entry.metadata()?;
                results.push(BlobEntry {
                    key,
                    size: metadata.len(),
                    last_modified: metadata.modified().ok().map(Into::into),
                });
            }
        }

        Ok(results)
    }

    fn open_reader(&self, key: &str) -> StoreResult<BlobReader> {
        self.check_cancelled()?;

        let path = self.full_path(key)?;
        let file = File::open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StoreError::ObjectNotFound(key.to_string())
            } else {
                StoreError::Io(e)
            }
        })?;
        Ok(Box::new(file))
    }
}
