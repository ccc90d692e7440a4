//! Content store data types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::hash::{compute_hash, is_valid_hash, HashAlgorithm};
use crate::error::{CustodyError, CustodyResult};

/// Content address: lower-case hex SHA-256 of the stored bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey(String);

impl StorageKey {
    /// Build a key from an already computed SHA-256 hex digest
    pub fn from_sha256(sha256: &str) -> CustodyResult<Self> {
        let sha256 = sha256.trim();
        if !is_valid_hash(sha256, HashAlgorithm::Sha256) {
            return Err(CustodyError::InvalidInput(format!(
                "Not a SHA-256 digest: '{}'",
                sha256
            )));
        }
        Ok(StorageKey(sha256.to_ascii_lowercase()))
    }

    /// Derive the key for a byte payload
    pub fn for_bytes(data: &[u8]) -> Self {
        StorageKey(compute_hash(data, HashAlgorithm::Sha256))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-level shard prefix used by directory backends (`ab`, `cd`)
    pub fn shards(&self) -> (&str, &str) {
        (&self.0[0..2], &self.0[2..4])
    }
}

impl TryFrom<String> for StorageKey {
    type Error = CustodyError;

    fn try_from(value: String) -> CustodyResult<Self> {
        StorageKey::from_sha256(&value)
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference-counted stored payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlob {
    pub storage_key: StorageKey,
    pub byte_length: u64,
    /// Number of evidence records pointing at this payload
    pub ref_count: u64,
}
