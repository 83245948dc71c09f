//! # Bucket Credentials
//!
//! Credentials are fetched by secret name and handed to the store driver
//! as an opaque key/value mapping. Values are never logged.

mod errors;
mod secret_dir;

pub use errors::{CredentialError, CredentialResult};
pub use secret_dir::SecretDirectory;

use std::collections::BTreeMap;
use std::fmt;

/// Source of bucket credentials
pub trait CredentialSource: Send + Sync {
    /// Fetch the key/value pairs stored under `secret_name`
    fn get_credentials(&self, secret_name: &str) -> CredentialResult<Credentials>;
}

/// Secret key/value pairs
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    entries: BTreeMap<String, Vec<u8>>,
}

impl Credentials {
    /// No credentials; drivers fall back to ambient provider configuration
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Value of `key` as UTF-8 text
    pub fn get_str(&self, key: &str) -> CredentialResult<Option<&str>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(value) => std::str::from_utf8(value)
                .map(Some)
                .map_err(|_| CredentialError::NonUtf8Value(key.to_string())),
        }
    }

    /// Iterate entries as UTF-8 text, failing on the first binary value
    pub fn iter_str(&self) -> impl Iterator<Item = CredentialResult<(&str, &str)>> {
        self.entries.iter().map(|(k, v)| {
            std::str::from_utf8(v)
                .map(|v| (k.as_str(), v))
                .map_err(|_| CredentialError::NonUtf8Value(k.clone()))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut credentials = Credentials::empty();
        for (k, v) in iter {
            credentials.insert(k, v);
        }
        credentials
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_values() {
        let creds: Credentials = [("secret-access-key", "hunter2")].into_iter().collect();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("secret-access-key"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_non_utf8_value() {
        let mut creds = Credentials::empty();
        creds.insert("key", vec![0xff, 0xfe]);
        assert!(matches!(
            creds.get_str("key"),
            Err(CredentialError::NonUtf8Value(_))
        ));
        assert_eq!(creds.get_str("missing").unwrap(), None);
        assert!(creds.iter_str().next().unwrap().is_err());
    }
}
