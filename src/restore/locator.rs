//! Backup archive discovery
//!
//! The bucket holds one `.tar.gz` archive per cluster member. Archives either
//! sit directly under the bucket prefix or are grouped into dated backup
//! generations, `YYYY-MM-DD-HH-MM-SS/<member>.tar.gz`. When generations are
//! present only the most recent one is restored.

use std::fmt;

use serde::Serialize;

use crate::store::BlobStore;

use super::errors::{RestoreError, RestoreResult};

/// Suffix every archive key carries
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Shape of a dated generation directory, `d` standing for an ASCII digit
const DATED_PREFIX_PATTERN: &[u8; 20] = b"dddd-dd-dd-dd-dd-dd/";

/// Returns the `YYYY-MM-DD-HH-MM-SS/` segment a key starts with, if any
pub fn dated_prefix(key: &str) -> Option<&str> {
    let bytes = key.as_bytes();
    if bytes.len() < DATED_PREFIX_PATTERN.len() {
        return None;
    }
    let matches = DATED_PREFIX_PATTERN
        .iter()
        .zip(bytes)
        .all(|(expected, actual)| match expected {
            b'd' => actual.is_ascii_digit(),
            other => other == actual,
        });
    matches.then(|| &key[..DATED_PREFIX_PATTERN.len()])
}

/// Key of one archive object, relative to the bucket prefix
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BackupKey(String);

impl BackupKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name with the archive suffix stripped, e.g. the recovery
    /// identifier `abc` for `2024-01-01-00-00-00/abc.tar.gz`
    pub fn base_name(&self) -> &str {
        let file_name = self.0.rsplit('/').next().unwrap_or(&self.0);
        file_name.strip_suffix(ARCHIVE_SUFFIX).unwrap_or(file_name)
    }

    pub fn dated_prefix(&self) -> Option<&str> {
        dated_prefix(&self.0)
    }

    pub fn is_archive(&self) -> bool {
        self.0.ends_with(ARCHIVE_SUFFIX)
    }
}

impl fmt::Display for BackupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BackupKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Sorted, non-empty set of archives belonging to one backup generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSet {
    keys: Vec<BackupKey>,
    generation: Option<String>,
}

impl BackupSet {
    /// Narrow raw bucket keys to the applicable archives
    ///
    /// Non-archive keys are dropped. If any key lives in a dated generation,
    /// every key outside the latest generation is dropped, undated keys
    /// included.
    pub fn from_keys<I, K>(keys: I) -> RestoreResult<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut archives: Vec<BackupKey> = keys
            .into_iter()
            .map(BackupKey::new)
            .filter(BackupKey::is_archive)
            .collect();

        // String order equals chronological order only because the
        // generation name is fixed-width and zero-padded. If the format ever
        // changes this comparison must be replaced with a real timestamp
        // parse. Two equal prefixes name the same generation.
        let latest = archives
            .iter()
            .filter_map(BackupKey::dated_prefix)
            .max()
            .map(str::to_string);

        if let Some(ref generation) = latest {
            archives.retain(|k| k.dated_prefix() == Some(generation.as_str()));
        }

        if archives.is_empty() {
            return Err(RestoreError::no_archives_found());
        }

        archives.sort();

        Ok(Self {
            keys: archives,
            generation: latest.map(|g| g.trim_end_matches('/').to_string()),
        })
    }

    pub fn keys(&self) -> &[BackupKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Dated generation the set was narrowed to, without the trailing `/`
    pub fn generation(&self) -> Option<&str> {
        self.generation.as_deref()
    }

    /// Positional archive for a worker ordinal
    pub fn key_for_ordinal(&self, ordinal: usize) -> RestoreResult<&BackupKey> {
        self.keys
            .get(ordinal)
            .ok_or_else(|| RestoreError::ordinal_out_of_range(ordinal, self.keys.len()))
    }

    /// Archive whose base name equals a recovery identifier
    pub fn find_by_base_name(&self, name: &str) -> Option<&BackupKey> {
        self.keys.iter().find(|k| k.base_name() == name)
    }
}

/// List the bucket and narrow it to the applicable backup set
pub fn locate_backups(store: &dyn BlobStore) -> RestoreResult<BackupSet> {
    let entries = store.list()?;
    let listed = entries.len();

    let set = BackupSet::from_keys(entries.into_iter().map(|e| e.key))?;

    tracing::info!(
        listed,
        archives = set.len(),
        generation = set.generation().unwrap_or(""),
        "located backup archives"
    );

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restore::RestoreErrorCode;
    use crate::store::{BlobEntry, BlobReader, StoreError, StoreResult};

    fn keys(set: &BackupSet) -> Vec<&str> {
        set.keys().iter().map(BackupKey::as_str).collect()
    }

    #[test]
    fn test_dated_prefix_grammar() {
        assert_eq!(
            dated_prefix("2024-03-07-09-05-01/a.tar.gz"),
            Some("2024-03-07-09-05-01/")
        );
        assert_eq!(dated_prefix("2024-03-07-09-05-01"), None);
        assert_eq!(dated_prefix("2024-3-07-09-05-01/a.tar.gz"), None);
        assert_eq!(dated_prefix("2024_03_07_09_05_01/a.tar.gz"), None);
        assert_eq!(dated_prefix("x/2024-03-07-09-05-01/a.tar.gz"), None);
        assert_eq!(dated_prefix("abc.tar.gz"), None);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(BackupKey::new("x/abc.tar.gz").base_name(), "abc");
        assert_eq!(BackupKey::new("abc.tar.gz").base_name(), "abc");
        assert_eq!(
            BackupKey::new("2024-01-01-00-00-00/a/b/uuid-1.tar.gz").base_name(),
            "uuid-1"
        );
    }

    #[test]
    fn test_filters_suffix_and_sorts() {
        let set = BackupSet::from_keys(["c.tar.gz", "readme.txt", "a.tar.gz", "b.tar", "b.tar.gz"])
            .unwrap();
        assert_eq!(keys(&set), vec!["a.tar.gz", "b.tar.gz", "c.tar.gz"]);
        assert_eq!(set.generation(), None);
    }

    #[test]
    fn test_latest_generation_wins() {
        let set = BackupSet::from_keys([
            "2023-12-31-23-59-59/m1.tar.gz",
            "2024-01-02-00-00-00/m1.tar.gz",
            "undated.tar.gz",
            "2024-01-02-00-00-00/m0.tar.gz",
            "2024-01-01-12-00-00/m0.tar.gz",
            "2024-01-02-00-00-00/notes.txt",
        ])
        .unwrap();

        assert_eq!(
            keys(&set),
            vec![
                "2024-01-02-00-00-00/m0.tar.gz",
                "2024-01-02-00-00-00/m1.tar.gz"
            ]
        );
        assert_eq!(set.generation(), Some("2024-01-02-00-00-00"));
    }

    #[test]
    fn test_empty_after_filtering() {
        let err = BackupSet::from_keys(["a.txt", "b.zip"]).unwrap_err();
        assert_eq!(err.code(), RestoreErrorCode::NoArchivesFound);

        let err = BackupSet::from_keys(Vec::<String>::new()).unwrap_err();
        assert_eq!(err.code(), RestoreErrorCode::NoArchivesFound);
    }

    #[test]
    fn test_ordinal_lookup() {
        let set = BackupSet::from_keys(["k0.tar.gz", "k1.tar.gz", "k2.tar.gz"]).unwrap();
        assert_eq!(set.key_for_ordinal(1).unwrap().as_str(), "k1.tar.gz");

        let err = set.key_for_ordinal(3).unwrap_err();
        assert_eq!(err.code(), RestoreErrorCode::OrdinalOutOfRange);
    }

    #[derive(Debug)]
    struct FailingStore;

    impl BlobStore for FailingStore {
        fn list(&self) -> StoreResult<Vec<BlobEntry>> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "listing interrupted",
            )))
        }

        fn open_reader(&self, key: &str) -> StoreResult<BlobReader> {
            Err(StoreError::ObjectNotFound(key.to_string()))
        }
    }

    #[test]
    fn test_listing_error_surfaces() {
        let err = locate_backups(&FailingStore).unwrap_err();
        assert_eq!(err.code(), RestoreErrorCode::Io);
        assert!(err.to_string().contains("listing interrupted"));
    }
}
