//! # Bucket URIs
//!
//! `<scheme>://<bucket>[/<prefix>][?<option>=<value>...]`, e.g.
//! `s3://backups/hazelcast?region=eu-west-1` or `file:///mnt/backups`.
//! For `file` URIs the whole path is the root directory.

use std::fmt;
use std::path::PathBuf;

use url::Url;

use super::errors::{StoreError, StoreResult};

/// Scheme served from the local filesystem
pub const FILE_SCHEME: &str = "file";

/// Parsed bucket location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketUri {
    url: Url,
    bucket: String,
    prefix: String,
}

impl BucketUri {
    pub fn parse(uri: &str) -> StoreResult<Self> {
        if uri.trim().is_empty() {
            return Err(StoreError::invalid_uri(uri, "empty"));
        }

        let url = Url::parse(uri).map_err(|e| StoreError::invalid_uri(uri, e.to_string()))?;

        if url.scheme() == FILE_SCHEME {
            if url.to_file_path().is_err() {
                return Err(StoreError::invalid_uri(uri, "not a local path"));
            }
            return Ok(Self {
                url,
                bucket: String::new(),
                prefix: String::new(),
            });
        }

        let bucket = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(StoreError::invalid_uri(uri, "missing bucket name")),
        };
        let prefix = url.path().trim_matches('/').to_string();

        Ok(Self {
            url,
            bucket,
            prefix,
        })
    }

    /// Lowercase scheme selecting the driver
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Bucket or container name; empty for `file` URIs
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key prefix without leading or trailing `/`; may be empty
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Query pairs, in order of appearance
    pub fn options(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Root directory of a `file` URI
    pub fn local_path(&self) -> StoreResult<PathBuf> {
        self.url
            .to_file_path()
            .map_err(|_| StoreError::invalid_uri(self.url.as_str(), "not a local path"))
    }
}

impl fmt::Display for BucketUri {
    // Query options may carry credentials and are left out.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scheme() == FILE_SCHEME {
            return write!(f, "{}://{}", FILE_SCHEME, self.url.path());
        }
        write!(f, "{}://{}", self.scheme(), self.bucket)?;
        if !self.prefix.is_empty() {
            write!(f, "/{}", self.prefix)?;
        }
        Ok(())
    }
}
