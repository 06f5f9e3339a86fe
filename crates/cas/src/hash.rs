//! ContentHash: a full-width BLAKE3 content digest (64 hex chars).
//!
//! Digests are long-lived identifiers here - clients hold on to them, pass
//! them between machines, and the move engine rewrites histories around
//! them - so we keep the full 256 bits rather than truncating.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A content hash - 256 bits (32 bytes, 64 hex chars) of BLAKE3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

/// Errors that can occur when working with content hashes.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid hash length: expected 64 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in hash")]
    InvalidHex,
}

impl ContentHash {
    /// Hash data and return the content hash.
    ///
    /// Deterministic over the exact byte sequence; no normalization of any
    /// kind is applied.
    pub fn from_data(data: &[u8]) -> Self {
        let digest = blake3::hash(data);
        Self(hex::encode(digest.as_bytes()))
    }

    /// Create from an existing hash string (validates format).
    pub fn from_str_checked(s: &str) -> Result<Self, HashError> {
        if s.len() != 64 {
            return Err(HashError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashError::InvalidHex);
        }
        Ok(Self(s.to_lowercase()))
    }

    /// Get the first 2 characters (used for directory sharding).
    pub fn prefix(&self) -> &str {
        &self.0[0..2]
    }

    /// Get the remainder after the prefix (used as filename).
    pub fn remainder(&self) -> &str {
        &self.0[2..]
    }

    /// Get the full hash as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
