//! Reconciliation of local recovery folders with the remote backup set
//!
//! A worker that crashed mid-recovery, or that is being restored over an
//! existing data directory, leaves recovery folders named by their recovery
//! UUID under the destination root. Other directories (`lost+found`, tool
//! caches) are not recovery folders and are left alone. Archives are named by the same
//! identifier, which lets the worker pick the archive matching its own data
//! and drop the folder the restore supersedes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::errors::{RestoreError, RestoreResult};
use super::locator::{BackupKey, BackupSet};

/// Recovery folders found under the destination root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRecoveryState {
    root: PathBuf,
    folders: Vec<String>,
}

impl LocalRecoveryState {
    /// Read the UUID-named directories directly under `root`, sorted by name.
    /// A missing root has no recovery folders.
    pub fn read(root: &Path) -> RestoreResult<Self> {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::from_folders(root, Vec::<String>::new()))
            }
            Err(e) => return Err(RestoreError::io_error_at_path(root, e)),
        };

        let mut folders = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RestoreError::io_error_at_path(root, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| RestoreError::io_error_at_path(&entry.path(), e))?;
            if !file_type.is_dir() {
                continue;
            }

            let name = entry.file_name();
            match name.to_str() {
                Some(name) if Uuid::parse_str(name).is_ok() => folders.push(name.to_string()),
                Some(name) => tracing::debug!(folder = name, "skipping non-recovery directory"),
                None => tracing::debug!(folder = ?name, "skipping directory with non UTF-8 name"),
            }
        }

        Ok(Self::from_folders(root, folders))
    }

    pub fn from_folders<I, S>(root: &Path, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut folders: Vec<String> = folders.into_iter().map(Into::into).collect();
        folders.sort();
        Self {
            root: root.to_path_buf(),
            folders,
        }
    }

    pub fn folders(&self) -> &[String] {
        &self.folders
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    fn folder_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// Local folder whose name differs from the archive chosen for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMismatch {
    pub folder: String,
    pub key: BackupKey,
}

/// Archive to restore and the folder it supersedes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePlan {
    pub key: BackupKey,
    pub delete: Option<PathBuf>,
    pub mismatch: Option<IdentityMismatch>,
}

/// Decide which archive this worker restores and which folder, if any, it
/// removes first
pub fn plan_restore(
    local: &LocalRecoveryState,
    ordinal: usize,
    backups: &BackupSet,
) -> RestoreResult<RestorePlan> {
    let positional = backups.key_for_ordinal(ordinal)?;

    let plan = match local.folders() {
        [] => RestorePlan {
            key: positional.clone(),
            delete: None,
            mismatch: None,
        },

        [folder] => match backups.find_by_base_name(folder) {
            Some(key) => RestorePlan {
                key: key.clone(),
                delete: Some(local.folder_path(folder)),
                mismatch: None,
            },
            // The operator is restoring a different cluster's backup; keep
            // the unmatched folder.
            None => RestorePlan {
                key: positional.clone(),
                delete: None,
                mismatch: Some(IdentityMismatch {
                    folder: folder.clone(),
                    key: positional.clone(),
                }),
            },
        },

        folders => {
            if folders.len() != backups.len() {
                return Err(RestoreError::mismatched_backup_count(
                    folders.len(),
                    backups.len(),
                ));
            }
            let folder = &folders[ordinal];
            RestorePlan {
                key: positional.clone(),
                delete: Some(local.folder_path(folder)),
                mismatch: (positional.base_name() != folder.as_str()).then(|| IdentityMismatch {
                    folder: folder.clone(),
                    key: positional.clone(),
                }),
            }
        }
    };

    if let Some(ref mismatch) = plan.mismatch {
        tracing::warn!(
            folder = %mismatch.folder,
            key = %mismatch.key,
            "restored backup identifier differs from the local recovery folder"
        );
    }

    Ok(plan)
}

/// Remove the superseded folder, if the plan names one
pub fn apply_plan(plan: &RestorePlan) -> RestoreResult<Option<PathBuf>> {
    let Some(ref folder) = plan.delete else {
        return Ok(None);
    };

    tracing::info!(folder = %folder.display(), "removing superseded recovery folder");
    fs::remove_dir_all(folder).map_err(|e| {
        RestoreError::io_error(
            format!("Failed to remove recovery folder {}", folder.display()),
            e,
        )
    })?;

    Ok(Some(folder.clone()))
}

/// Read local state, plan, and remove the superseded folder
pub fn reconcile(root: &Path, ordinal: usize, backups: &BackupSet) -> RestoreResult<RestorePlan> {
    let local = LocalRecoveryState::read(root)?;
    tracing::info!(folders = local.len(), "read local recovery state");

    let plan = plan_restore(&local, ordinal, backups)?;
    apply_plan(&plan)?;
    Ok(plan)
}
