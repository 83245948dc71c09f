//! Worker ordinal resolution
//!
//! Workers are named `<base-name>-<ordinal>`, the stable network identity a
//! StatefulSet assigns to its pods. The base name follows DNS label rules:
//! lowercase alphanumerics and `-`, starting and ending with an alphanumeric,
//! at most 63 characters. The ordinal is the zero-based shard index.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Maximum length of a DNS label
pub const MAX_BASE_NAME_LEN: usize = 63;

/// Why a worker name was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("worker name is empty")]
    Empty,

    #[error("no '-' separating base name and ordinal")]
    MissingSeparator,

    #[error("base name is empty")]
    EmptyBaseName,

    #[error("base name is {0} characters long (max 63)")]
    BaseNameTooLong(usize),

    #[error("base name contains invalid character {0:?}")]
    InvalidBaseNameChar(char),

    #[error("base name must start and end with a lowercase alphanumeric")]
    InvalidBaseNameEdge,

    #[error("ordinal is empty")]
    EmptyOrdinal,

    #[error("ordinal contains non-digit character {0:?}")]
    NonNumericOrdinal(char),

    #[error("ordinal {0} does not fit in a machine word")]
    OrdinalOverflow(String),
}

/// Parsed worker identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    base_name: String,
    ordinal: usize,
}

impl WorkerIdentity {
    /// Parse a worker name into its base name and ordinal
    pub fn parse(name: &str) -> Result<Self, IdentityError> {
        if name.is_empty() {
            return Err(IdentityError::Empty);
        }

        // The ordinal is everything after the last '-'; the base name may
        // itself contain dashes.
        let (base, ordinal) = name
            .rsplit_once('-')
            .ok_or(IdentityError::MissingSeparator)?;

        validate_base_name(base)?;
        let ordinal = parse_ordinal(ordinal)?;

        Ok(Self {
            base_name: base.to_string(),
            ordinal,
        })
    }

    /// Base name without the ordinal suffix
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Zero-based shard index
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl FromStr for WorkerIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base_name, self.ordinal)
    }
}

/// Resolve the ordinal of a worker name
pub fn resolve_ordinal(name: &str) -> Result<usize, IdentityError> {
    WorkerIdentity::parse(name).map(|id| id.ordinal())
}

fn validate_base_name(base: &str) -> Result<(), IdentityError> {
    if base.is_empty() {
        return Err(IdentityError::EmptyBaseName);
    }
    if base.len() > MAX_BASE_NAME_LEN {
        return Err(IdentityError::BaseNameTooLong(base.len()));
    }
    if let Some(c) = base
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(IdentityError::InvalidBaseNameChar(c));
    }
    if base.starts_with('-') || base.ends_with('-') {
        return Err(IdentityError::InvalidBaseNameEdge);
    }
    Ok(())
}

fn parse_ordinal(ordinal: &str) -> Result<usize, IdentityError> {
    if ordinal.is_empty() {
        return Err(IdentityError::EmptyOrdinal);
    }
    if let Some(c) = ordinal.chars().find(|c| !c.is_ascii_digit()) {
        return Err(IdentityError::NonNumericOrdinal(c));
    }
    ordinal
        .parse::<usize>()
        .map_err(|_| IdentityError::OrdinalOverflow(ordinal.to_string()))
}
