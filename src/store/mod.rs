//! # Object Store Access
//!
//! Read-only access to the bucket holding backup archives: URI parsing,
//! the scheme-keyed driver registry, and the drivers themselves.

pub mod backend;
pub mod errors;
pub mod local;
pub mod object;
pub mod registry;
pub mod uri;

pub use backend::{BlobEntry, BlobReader, BlobStore};
pub use errors::{StoreError, StoreResult};
pub use local::LocalBackend;
pub use object::ObjectStoreBucket;
pub use registry::{DriverFactory, DriverRegistry};
pub use uri::BucketUri;
