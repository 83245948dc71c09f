//! Completion lock handling
//!
//! A completion lock is an empty marker file under the destination root:
//!
//! ```text
//! .restore_lock.<restore-id>.<ordinal>
//! ```
//!
//! `<restore-id>` is optional and may hold any character except `.`, path
//! separators, whitespace and control characters. `<ordinal>` is the decimal
//! worker ordinal. Its presence means the worker already
//! finished restoring for that restore operation. The lock is checked once
//! before any destructive action and written once after extraction.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::errors::{RestoreError, RestoreResult};

/// Fixed lock name prefix
pub const LOCK_PREFIX: &str = "restore_lock";

/// Permission bits of a written lock file
pub const LOCK_FILE_MODE: u32 = 0o600;

/// Why a file name is not a completion lock
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockNameError {
    #[error("missing '.restore_lock.' prefix")]
    MissingPrefix,

    #[error("missing '.' before the ordinal")]
    MissingOrdinal,

    #[error("restore id contains invalid character {0:?}")]
    InvalidRestoreIdChar(char),

    #[error("ordinal is empty")]
    EmptyOrdinal,

    #[error("ordinal {0:?} is not a decimal number")]
    InvalidOrdinal(String),
}

/// Parsed completion lock file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockName {
    restore_id: String,
    ordinal: usize,
}

impl LockName {
    /// Lock name for a restore identifier and ordinal
    pub fn new(restore_id: &str, ordinal: usize) -> Result<Self, LockNameError> {
        validate_restore_id(restore_id)?;
        Ok(Self {
            restore_id: restore_id.to_string(),
            ordinal,
        })
    }

    /// Parse a directory entry name
    pub fn parse(file_name: &str) -> Result<Self, LockNameError> {
        let rest = file_name
            .strip_prefix('.')
            .and_then(|s| s.strip_prefix(LOCK_PREFIX))
            .and_then(|s| s.strip_prefix('.'))
            .ok_or(LockNameError::MissingPrefix)?;

        let (restore_id, ordinal) = rest.rsplit_once('.').ok_or(LockNameError::MissingOrdinal)?;
        validate_restore_id(restore_id)?;

        if ordinal.is_empty() {
            return Err(LockNameError::EmptyOrdinal);
        }
        if !ordinal.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LockNameError::InvalidOrdinal(ordinal.to_string()));
        }
        let ordinal = ordinal
            .parse()
            .map_err(|_| LockNameError::InvalidOrdinal(ordinal.to_string()))?;

        Ok(Self {
            restore_id: restore_id.to_string(),
            ordinal,
        })
    }

    pub fn restore_id(&self) -> &str {
        &self.restore_id
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn file_name(&self) -> String {
        format!(".{}.{}.{}", LOCK_PREFIX, self.restore_id, self.ordinal)
    }
}

/// Reject characters that would split the name or escape the destination root
fn validate_restore_id(restore_id: &str) -> Result<(), LockNameError> {
    match restore_id
        .chars()
        .find(|c| matches!(*c, '.' | '/' | '\\') || c.is_whitespace() || c.is_control())
    {
        Some(c) => Err(LockNameError::InvalidRestoreIdChar(c)),
        None => Ok(()),
    }
}

/// Completion lock of one worker for one restore operation
#[derive(Debug, Clone)]
pub struct CompletionLock {
    root: PathBuf,
    name: LockName,
}

impl CompletionLock {
    pub fn new(root: &Path, restore_id: &str, ordinal: usize) -> RestoreResult<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            name: LockName::new(restore_id, ordinal)?,
        })
    }

    pub fn name(&self) -> &LockName {
        &self.name
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(self.name.file_name())
    }

    /// Whether this restore already completed for this worker
    pub fn is_held(&self) -> RestoreResult<bool> {
        let path = self.path();
        match fs::metadata(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RestoreError::io_error_at_path(&path, e)),
        }
    }

    /// Remove every lock of this worker's ordinal, whatever its restore id
    pub fn sweep_stale(&self) -> RestoreResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RestoreError::io_error_at_path(&self.root, e)),
        };

        let mut removed = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RestoreError::io_error_at_path(&self.root, e))?;
            let file_name = entry.file_name();
            let Some(lock) = file_name.to_str().and_then(|n| LockName::parse(n).ok()) else {
                continue;
            };
            if lock.ordinal() != self.name.ordinal() {
                continue;
            }

            let path = entry.path();
            fs::remove_file(&path).map_err(|e| {
                RestoreError::io_error(format!("Failed to remove stale lock {}", path.display()), e)
            })?;
            tracing::info!(lock = %path.display(), "removed stale restore lock");
            removed.push(path);
        }

        Ok(removed)
    }

    /// Sweep stale locks, then write the fresh one
    pub fn commit(&self) -> RestoreResult<PathBuf> {
        self.sweep_stale()?;

        let path = self.path();
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(LOCK_FILE_MODE);
        }

        match options.open(&path) {
            Ok(_) => {}
            // Another process for this worker committed between our sweep
            // and this write; its lock stands.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::warn!(lock = %path.display(), "restore lock appeared concurrently");
            }
            Err(e) => {
                return Err(RestoreError::io_error(
                    format!("Failed to create restore lock {}", path.display()),
                    e,
                ))
            }
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restore::RestoreErrorCode;
    use tempfile::TempDir;

    #[test]
    fn test_file_name_grammar() {
        let lock = LockName::new("12345", 12).unwrap();
        assert_eq!(lock.file_name(), ".restore_lock.12345.12");

        let lock = LockName::new("", 0).unwrap();
        assert_eq!(lock.file_name(), ".restore_lock..0");
    }

    #[test]
    fn test_parse_valid_names() {
        let lock = LockName::parse(".restore_lock.abc123.7").unwrap();
        assert_eq!(lock.restore_id(), "abc123");
        assert_eq!(lock.ordinal(), 7);

        let lock = LockName::parse(".restore_lock..3").unwrap();
        assert_eq!(lock.restore_id(), "");
        assert_eq!(lock.ordinal(), 3);

        let lock = LockName::parse(".restore_lock.5d9c-44aa.0").unwrap();
        assert_eq!(lock.restore_id(), "5d9c-44aa");
    }

    #[test]
    fn test_parse_rejections_carry_reason() {
        assert_eq!(
            LockName::parse("restore_lock.a.1"),
            Err(LockNameError::MissingPrefix)
        );
        assert_eq!(
            LockName::parse(".other_lock.a.1"),
            Err(LockNameError::MissingPrefix)
        );
        assert_eq!(
            LockName::parse(".restore_lock.1"),
            Err(LockNameError::MissingOrdinal)
        );
        assert_eq!(
            LockName::parse(".restore_lock.a."),
            Err(LockNameError::EmptyOrdinal)
        );
        assert_eq!(
            LockName::parse(".restore_lock.a.1x"),
            Err(LockNameError::InvalidOrdinal("1x".to_string()))
        );
        assert_eq!(
            LockName::parse(".restore_lock.a b.1"),
            Err(LockNameError::InvalidRestoreIdChar(' '))
        );
        assert_eq!(
            LockName::parse(".restore_lock.a.b.1"),
            Err(LockNameError::InvalidRestoreIdChar('.'))
        );
    }

    #[test]
    fn test_invalid_restore_id_rejected() {
        let temp = TempDir::new().unwrap();
        for id in ["a.b", "../up", "back\\slash", "tab\tid", "nul\0id"] {
            let err = CompletionLock::new(temp.path(), id, 0).unwrap_err();
            assert_eq!(err.code(), RestoreErrorCode::InvalidConfig, "{:?}", id);
        }
    }

    #[test]
    fn test_mixed_case_restore_id_round_trips() {
        let temp = TempDir::new().unwrap();
        let lock = CompletionLock::new(temp.path(), "Backup_2024-Q1", 4).unwrap();
        assert_eq!(lock.name().file_name(), ".restore_lock.Backup_2024-Q1.4");

        let path = lock.commit().unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap();
        let parsed = LockName::parse(file_name).unwrap();
        assert_eq!(parsed.restore_id(), "Backup_2024-Q1");
        assert_eq!(parsed.ordinal(), 4);
    }

    #[test]
    fn test_check_and_commit() {
        let temp = TempDir::new().unwrap();
        let lock = CompletionLock::new(temp.path(), "r1", 2).unwrap();

        assert!(!lock.is_held().unwrap());
        let path = lock.commit().unwrap();
        assert!(lock.is_held().unwrap());
        assert_eq!(path, temp.path().join(".restore_lock.r1.2"));
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = CompletionLock::new(temp.path(), "", 0)
            .unwrap()
            .commit()
            .unwrap();
        let mode = fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, LOCK_FILE_MODE);
    }

    #[test]
    fn test_commit_sweeps_only_same_ordinal() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join(".restore_lock.old.2"), b"").unwrap();
        fs::write(root.join(".restore_lock..2"), b"").unwrap();
        fs::write(root.join(".restore_lock.old.12"), b"").unwrap();
        fs::write(root.join(".restore_lock.old.1"), b"").unwrap();
        fs::write(root.join(".unrelated.2"), b"").unwrap();

        let lock = CompletionLock::new(root, "new", 2).unwrap();
        let removed = lock.sweep_stale().unwrap();
        assert_eq!(removed.len(), 2);

        lock.commit().unwrap();

        assert!(!root.join(".restore_lock.old.2").exists());
        assert!(!root.join(".restore_lock..2").exists());
        assert!(root.join(".restore_lock.new.2").exists());
        assert!(root.join(".restore_lock.old.12").exists());
        assert!(root.join(".restore_lock.old.1").exists());
        assert!(root.join(".unrelated.2").exists());
    }

    #[test]
    fn test_sweep_missing_root() {
        let temp = TempDir::new().unwrap();
        let lock = CompletionLock::new(&temp.path().join("absent"), "", 0).unwrap();
        assert!(lock.sweep_stale().unwrap().is_empty());
        assert!(!lock.is_held().unwrap());
    }
}
