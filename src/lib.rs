//! shard-restore - Per-worker restore of sharded data from bucket backups
//!
//! Each worker of a sharded cluster runs this once before its data service
//! starts. It derives its shard ordinal from its name, picks the matching
//! archive from the latest backup generation, unpacks it into the
//! destination root and leaves a completion lock so reruns are no-ops.

pub mod cli;
pub mod credentials;
pub mod observability;
pub mod restore;
pub mod store;
