//! # Blob Store Trait

use std::fmt;
use std::io::Read;

use chrono::{DateTime, Utc};

use super::errors::StoreResult;

/// One object returned by a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Key relative to the bucket URI prefix, `/`-separated
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modification time, when the backend reports one
    pub last_modified: Option<DateTime<Utc>>,
}

impl BlobEntry {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
        }
    }
}

/// Streaming object body; dropping it releases the underlying connection or file
pub type BlobReader = Box<dyn Read + Send>;

/// Read-only capability set of a remote bucket
///
/// Implementations are synchronous. Drivers wrapping async clients must
/// honour the cancellation token they were opened with on every blocking call.
pub trait BlobStore: Send + Sync + fmt::Debug {
    /// Enumerate every object in the bucket
    fn list(&self) -> StoreResult<Vec<BlobEntry>>;

    /// Open a streaming reader over the object at `key`
    fn open_reader(&self, key: &str) -> StoreResult<BlobReader>;
}
