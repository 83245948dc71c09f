//! Restore subsystem for shard-restore
//!
//! Restore reconstructs one worker's shard data from the latest backup
//! generation in a bucket.
//!
//! # Algorithm
//!
//! 1. Resolve the worker ordinal from its name
//! 2. Check the completion lock; if held, stop with success
//! 3. Fetch bucket credentials and open the store
//! 4. List the bucket and narrow to the latest backup generation
//! 5. Reconcile local recovery folders, removing the superseded one
//! 6. Stream and unpack the chosen archive
//! 7. Sweep stale locks of this ordinal and write the fresh lock
//!
//! # Important
//!
//! Every failure is fatal and aborts the run. A failed run leaves partial
//! state on disk; re-running is safe because the lock is only written after
//! a complete extraction and is checked before anything is deleted.

mod errors;
mod extractor;
mod locator;
mod lock;
mod ordinal;
mod reconciler;

pub use errors::{BoxedSource, RestoreError, RestoreErrorCode, RestoreResult, Severity};
pub use extractor::{extract_archive, unpack_archive, ExtractionSummary};
pub use locator::{dated_prefix, locate_backups, BackupKey, BackupSet, ARCHIVE_SUFFIX};
pub use lock::{CompletionLock, LockName, LockNameError, LOCK_FILE_MODE, LOCK_PREFIX};
pub use ordinal::{resolve_ordinal, IdentityError, WorkerIdentity, MAX_BASE_NAME_LEN};
pub use reconciler::{
    apply_plan, plan_restore, reconcile, IdentityMismatch, LocalRecoveryState, RestorePlan,
};

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::credentials::{CredentialSource, Credentials};
use crate::store::{BlobStore, BucketUri, DriverRegistry};

/// Inputs of one restore run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Bucket URI, e.g. `s3://backups/cluster-a?region=eu-west-1`
    pub bucket_uri: String,
    /// Destination root holding recovery folders and locks
    pub destination: PathBuf,
    /// Worker name carrying the ordinal
    pub worker_name: String,
    /// Credential secret; empty means ambient provider credentials
    pub secret_name: String,
    /// Restore identifier baked into the lock name; may be empty
    pub restore_id: String,
}

/// How a restore run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RestoreOutcome {
    /// The completion lock was already present; nothing was touched
    AlreadyRestored { lock: PathBuf },
    /// An archive was extracted and the lock written
    Restored {
        key: BackupKey,
        removed_folder: Option<PathBuf>,
        lock: PathBuf,
        summary: ExtractionSummary,
    },
}

/// Drives one worker's restore from identity to completion lock
pub struct RestoreCoordinator<'a> {
    registry: &'a DriverRegistry,
    credentials: &'a dyn CredentialSource,
    cancel: CancellationToken,
}

impl<'a> RestoreCoordinator<'a> {
    pub fn new(
        registry: &'a DriverRegistry,
        credentials: &'a dyn CredentialSource,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            credentials,
            cancel,
        }
    }

    /// Run the full restore for `request`
    ///
    /// The lock check happens before the credential source or the store is
    /// contacted, so a completed worker never touches either.
    pub fn run(&self, request: &RestoreRequest) -> RestoreResult<RestoreOutcome> {
        let identity = WorkerIdentity::parse(&request.worker_name)
            .map_err(|e| RestoreError::invalid_identity(&request.worker_name, e))?;
        tracing::info!(
            worker = %identity,
            ordinal = identity.ordinal(),
            "resolved worker ordinal"
        );

        let lock = CompletionLock::new(
            &request.destination,
            &request.restore_id,
            identity.ordinal(),
        )?;
        if lock.is_held()? {
            let lock = lock.path();
            tracing::info!(lock = %lock.display(), "restore lock exists, nothing to do");
            return Ok(RestoreOutcome::AlreadyRestored { lock });
        }

        let uri = BucketUri::parse(&request.bucket_uri)?;
        tracing::info!(bucket = %uri, "opening backup bucket");

        let credentials = self.fetch_credentials(&request.secret_name)?;
        check_cancelled(&self.cancel)?;
        let store = self.registry.open(&uri, &credentials, &self.cancel)?;

        restore_from_store(store.as_ref(), &request.destination, &lock, &self.cancel)
    }

    fn fetch_credentials(&self, secret_name: &str) -> RestoreResult<Credentials> {
        if secret_name.is_empty() {
            tracing::info!("no secret configured, using ambient provider credentials");
            return Ok(Credentials::empty());
        }

        let credentials = self.credentials.get_credentials(secret_name)?;
        tracing::info!(
            secret = secret_name,
            entries = credentials.len(),
            "read bucket credentials"
        );
        Ok(credentials)
    }
}

/// Restore from an already opened store
///
/// Runs everything after the store open: locate, reconcile, extract and
/// commit `lock`.
pub fn restore_from_store(
    store: &dyn BlobStore,
    destination: &Path,
    lock: &CompletionLock,
    cancel: &CancellationToken,
) -> RestoreResult<RestoreOutcome> {
    let ordinal = lock.name().ordinal();

    let backups = locate_backups(store)?;

    // Nothing local is deleted once the run has been cancelled.
    check_cancelled(cancel)?;
    let plan = reconcile(destination, ordinal, &backups)?;
    tracing::info!(ordinal, key = %plan.key, "restoring archive");

    let summary = extract_archive(store, &plan.key, destination, cancel)?;
    let lock = lock.commit()?;

    tracing::info!(
        key = %plan.key,
        lock = %lock.display(),
        "restore completed"
    );

    Ok(RestoreOutcome::Restored {
        key: plan.key,
        removed_folder: plan.delete,
        lock,
        summary,
    })
}

fn check_cancelled(cancel: &CancellationToken) -> RestoreResult<()> {
    if cancel.is_cancelled() {
        return Err(RestoreError::cancelled("Restore cancelled"));
    }
    Ok(())
}
