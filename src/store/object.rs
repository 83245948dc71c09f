//! # Object Store Driver
//!
//! Bridges the async `object_store` clients into the synchronous
//! [`BlobStore`] interface. Every await is raced against the run's
//! cancellation token.
//!
//! The bridge calls `Handle::block_on`, so its methods must not be invoked
//! from inside an async task.

use std::future::Future;
use std::io::{self, Read};
use std::str::FromStr;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey};
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::gcp::{GoogleCloudStorageBuilder, GoogleConfigKey};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::credentials::Credentials;

use super::backend::{BlobEntry, BlobReader, BlobStore};
use super::errors::{StoreError, StoreResult};
use super::uri::BucketUri;

/// Bucket backed by an `object_store` client
#[derive(Debug)]
pub struct ObjectStoreBucket {
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
    handle: Handle,
    cancel: CancellationToken,
}

impl ObjectStoreBucket {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        prefix: &str,
        handle: Handle,
        cancel: CancellationToken,
    ) -> Self {
        let prefix = prefix.trim_matches('/');
        Self {
            store,
            prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
            handle,
            cancel,
        }
    }

    fn block_on<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = object_store::Result<T>>,
    {
        let cancel = &self.cancel;
        self.handle.block_on(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(StoreError::Cancelled),
                result = fut => result.map_err(StoreError::from),
            }
        })
    }

    fn location(&self, key: &str) -> ObjectPath {
        match &self.prefix {
            Some(prefix) => ObjectPath::from(format!("{}/{}", prefix, key)),
            None => ObjectPath::from(key),
        }
    }

    fn relative_key(&self, location: &ObjectPath) -> Option<String> {
        let location: &str = location.as_ref();
        match &self.prefix {
            Some(prefix) => location
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .map(str::to_string),
            None => Some(location.to_string()),
        }
    }
}

impl BlobStore for ObjectStoreBucket {
    fn list(&self) -> StoreResult<Vec<BlobEntry>> {
        let store = &self.store;
        let prefix = self.prefix.as_deref().map(ObjectPath::from);
        let objects: Vec<ObjectMeta> =
            self.block_on(async move { store.list(prefix.as_ref()).try_collect().await })?;

        Ok(objects
            .into_iter()
            .filter_map(|meta| {
                let key = self.relative_key(&meta.location)?;
                Some(BlobEntry {
                    key,
                    size: meta.size as u64,
                    last_modified: Some(meta.last_modified),
                })
            })
            .collect())
    }

    fn open_reader(&self, key: &str) -> StoreResult<BlobReader> {
        let store = &self.store;
        let location = self.location(key);
        let result = self.block_on(async move { store.get(&location).await })?;

        Ok(Box::new(ObjectStreamReader {
            stream: result.into_stream(),
            chunk: Bytes::new(),
            handle: self.handle.clone(),
            cancel: self.cancel.clone(),
        }))
    }
}

/// Blocking `Read` over an object's byte stream
struct ObjectStreamReader {
    stream: BoxStream<'static, object_store::Result<Bytes>>,
    chunk: Bytes,
    handle: Handle,
    cancel: CancellationToken,
}

impl Read for ObjectStreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.chunk.is_empty() {
            let stream = &mut self.stream;
            let cancel = &self.cancel;
            let next = self.handle.block_on(async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    item = stream.next() => Some(item),
                }
            });

            match next {
                None => return Err(StoreError::Cancelled.into_io()),
                Some(None) => return Ok(0),
                Some(Some(Ok(bytes))) => self.chunk = bytes,
                Some(Some(Err(e))) => return Err(StoreError::from(e).into_io()),
            }
        }

        let n = buf.len().min(self.chunk.len());
        buf[..n].copy_from_slice(&self.chunk[..n]);
        self.chunk.advance(n);
        Ok(n)
    }
}

/// Driver options from the URI query followed by credential entries.
///
/// Keys are normalised so that secret keys such as `access-key-id` match the
/// provider's `access_key_id` option.
fn driver_options(
    uri: &BucketUri,
    credentials: &Credentials,
) -> StoreResult<Vec<(String, String)>> {
    let mut options: Vec<(String, String)> = uri
        .options()
        .into_iter()
        .map(|(k, v)| (normalize_key(&k), v))
        .collect();

    for entry in credentials.iter_str() {
        let (key, value) = entry?;
        options.push((normalize_key(key), value.trim_end_matches('\n').to_string()));
    }
    Ok(options)
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('-', "_")
}

fn apply_options<B, K>(
    mut builder: B,
    provider: &str,
    options: Vec<(String, String)>,
    apply: impl Fn(B, K, String) -> B,
) -> B
where
    K: FromStr,
{
    for (key, value) in options {
        match K::from_str(&key) {
            Ok(config_key) => builder = apply(builder, config_key, value),
            Err(_) => tracing::warn!(provider, option = %key, "ignoring unrecognised store option"),
        }
    }
    builder
}

/// Amazon S3 and S3-compatible stores
pub fn build_s3(uri: &BucketUri, credentials: &Credentials) -> StoreResult<Arc<dyn ObjectStore>> {
    let builder = AmazonS3Builder::from_env().with_bucket_name(uri.bucket());
    let builder = apply_options(
        builder,
        "s3",
        driver_options(uri, credentials)?,
        |b, k: AmazonS3ConfigKey, v| b.with_config(k, v),
    );
    Ok(Arc::new(builder.build()?))
}

/// Google Cloud Storage
pub fn build_gcs(uri: &BucketUri, credentials: &Credentials) -> StoreResult<Arc<dyn ObjectStore>> {
    let builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(uri.bucket());
    let builder = apply_options(
        builder,
        "gs",
        driver_options(uri, credentials)?,
        |b, k: GoogleConfigKey, v| b.with_config(k, v),
    );
    Ok(Arc::new(builder.build()?))
}

/// Azure Blob Storage; the URI host is the container name
pub fn build_azure(
    uri: &BucketUri,
    credentials: &Credentials,
) -> StoreResult<Arc<dyn ObjectStore>> {
    let builder = MicrosoftAzureBuilder::from_env().with_container_name(uri.bucket());
    let builder = apply_options(
        builder,
        "azblob",
        driver_options(uri, credentials)?,
        |b, k: AzureConfigKey, v| b.with_config(k, v),
    );
    Ok(Arc::new(builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use object_store::PutPayload;
    use tokio::runtime::Runtime;

    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    fn seeded_store(rt: &Runtime, objects: &[(&str, &[u8])]) -> Arc<dyn ObjectStore> {
        let store = Arc::new(InMemory::new());
        for (key, data) in objects {
            rt.block_on(store.put(&ObjectPath::from(*key), PutPayload::from(data.to_vec())))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_list_strips_prefix() {
        let rt = runtime();
        let store = seeded_store(
            &rt,
            &[
                ("backups/a.tar.gz", b"a"),
                ("backups/2024-01-01-00-00-00/b.tar.gz", b"bb"),
                ("other/c.tar.gz", b"c"),
            ],
        );
        let cancel = CancellationToken::new();
        let bucket = ObjectStoreBucket::new(store, "backups/", rt.handle().clone(), cancel);

        let mut entries = bucket.list().unwrap();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-01-01-00-00-00/b.tar.gz", "a.tar.gz"]);
        assert_eq!(entries[0].size, 2);
        assert!(entries[0].last_modified.is_some());
    }

    #[test]
    fn test_reader_streams_object() {
        let rt = runtime();
        let body: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let store = seeded_store(&rt, &[("p/obj", &body)]);
        let cancel = CancellationToken::new();
        let bucket = ObjectStoreBucket::new(store, "p", rt.handle().clone(), cancel);

        let mut read = Vec::new();
        bucket.open_reader("obj").unwrap().read_to_end(&mut read).unwrap();
        assert_eq!(read, body);
    }

    #[test]
    fn test_missing_object() {
        let rt = runtime();
        let store = seeded_store(&rt, &[]);
        let cancel = CancellationToken::new();
        let bucket = ObjectStoreBucket::new(store, "", rt.handle().clone(), cancel);

        assert!(matches!(
            bucket.open_reader("absent.tar.gz"),
            Err(StoreError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn test_cancelled_before_list() {
        let rt = runtime();
        let store = seeded_store(&rt, &[("a.tar.gz", b"a")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let bucket = ObjectStoreBucket::new(store, "", rt.handle().clone(), cancel);

        assert!(matches!(bucket.list(), Err(StoreError::Cancelled)));
    }

    #[test]
    fn test_cancelled_mid_read() {
        let rt = runtime();
        let store = seeded_store(&rt, &[("a.tar.gz", b"abc")]);
        let cancel = CancellationToken::new();
        let bucket = ObjectStoreBucket::new(store, "", rt.handle().clone(), cancel.clone());

        let mut reader = bucket.open_reader("a.tar.gz").unwrap();
        cancel.cancel();
        let err = reader.read(&mut [0u8; 8]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn test_option_keys_are_normalised() {
        let uri = BucketUri::parse("s3://bucket?Region=eu-west-1").unwrap();
        let creds: Credentials = [("access-key-id", "AKIA\n")].into_iter().collect();

        let options = driver_options(&uri, &creds).unwrap();
        assert_eq!(
            options,
            vec![
                ("region".to_string(), "eu-west-1".to_string()),
                ("access_key_id".to_string(), "AKIA".to_string()),
            ]
        );
    }

    #[test]
    fn test_build_s3_with_explicit_options() {
        let uri = BucketUri::parse("s3://bucket/prefix?region=us-east-1").unwrap();
        let creds: Credentials = [
            ("access-key-id", "AKIAEXAMPLE"),
            ("secret-access-key", "secret"),
            ("unknown-key", "ignored"),
        ]
        .into_iter()
        .collect();

        assert!(build_s3(&uri, &creds).is_ok());
    }
}
