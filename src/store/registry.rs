//! # Store Driver Registry
//!
//! Maps URI schemes to driver factories. The registry is populated once at
//! process start and passed to the restore coordinator; nothing registers
//! itself implicitly.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use object_store::ObjectStore;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::credentials::Credentials;

use super::backend::BlobStore;
use super::errors::{StoreError, StoreResult};
use super::local::LocalBackend;
use super::object::{build_azure, build_gcs, build_s3, ObjectStoreBucket};
use super::uri::{BucketUri, FILE_SCHEME};

/// Opens a bucket for a parsed URI
pub type DriverFactory = Box<
    dyn Fn(&BucketUri, &Credentials, &CancellationToken) -> StoreResult<Box<dyn BlobStore>>
        + Send
        + Sync,
>;

type StoreBuilder = fn(&BucketUri, &Credentials) -> StoreResult<Arc<dyn ObjectStore>>;

/// Scheme-keyed set of store drivers
#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `s3`, `gs`, `azblob` and `file` drivers.
    ///
    /// `handle` drives the async object store clients.
    pub fn with_default_drivers(handle: Handle) -> Self {
        let mut registry = Self::new();

        let cloud: [(&str, StoreBuilder); 3] = [
            ("s3", build_s3),
            ("gs", build_gcs),
            ("azblob", build_azure),
        ];
        for (scheme, build) in cloud {
            let handle = handle.clone();
            registry.register(scheme, move |uri, credentials, cancel| {
                let store = build(uri, credentials)?;
                let bucket: Box<dyn BlobStore> = Box::new(ObjectStoreBucket::new(
                    store,
                    uri.prefix(),
                    handle.clone(),
                    cancel.clone(),
                ));
                Ok(bucket)
            });
        }

        registry.register(FILE_SCHEME, |uri, _credentials, cancel| {
            let bucket: Box<dyn BlobStore> =
                Box::new(LocalBackend::new(uri.local_path()?, cancel.clone()));
            Ok(bucket)
        });

        registry
    }

    /// Register or replace the driver for `scheme`
    pub fn register<F>(&mut self, scheme: &str, factory: F)
    where
        F: Fn(&BucketUri, &Credentials, &CancellationToken) -> StoreResult<Box<dyn BlobStore>>
            + Send
            + Sync
            + 'static,
    {
        self.drivers
            .insert(scheme.to_ascii_lowercase(), Box::new(factory));
    }

    /// Registered schemes in sorted order
    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }

    /// Open the bucket named by `uri`
    pub fn open(
        &self,
        uri: &BucketUri,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> StoreResult<Box<dyn BlobStore>> {
        let factory = self
            .drivers
            .get(uri.scheme())
            .ok_or_else(|| StoreError::UnsupportedScheme(uri.scheme().to_string()))?;
        factory(uri, credentials, cancel)
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("schemes", &self.drivers.keys().collect::<Vec<_>>())
            .finish()
    }
}
