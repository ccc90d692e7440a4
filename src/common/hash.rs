// Shared hash utilities for evidence fingerprinting
//
// Provides the digest algorithms recorded on every evidence record
// (MD5, SHA-1, SHA-256) behind one streaming interface.

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;

// =============================================================================
// Hash Algorithm Enum
// =============================================================================

/// Supported hash algorithms for evidence fingerprints
/// - MD5/SHA1: Legacy algorithms still requested by case management and courts
/// - SHA256: NIST approved, court-accepted forensic standard; also the content address
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Every algorithm computed during ingestion, in record order
    pub const ALL: [HashAlgorithm; 3] = [HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256];

    /// Get the canonical algorithm name
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
        }
    }

    /// Get expected hash length in hex characters
    pub fn hash_length(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
        }
    }
}

// =============================================================================
// Streaming Hasher - Unified interface for incremental hashing
// =============================================================================

/// A unified streaming hasher over the supported algorithms
#[derive(Clone)]
pub enum StreamingHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl StreamingHasher {
    /// Create a new streaming hasher for the specified algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => StreamingHasher::Md5(Md5::new()),
            HashAlgorithm::Sha1 => StreamingHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
        }
    }

    /// Update the hash with more data
    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Md5(h) => Digest::update(h, data),
            StreamingHasher::Sha1(h) => Digest::update(h, data),
            StreamingHasher::Sha256(h) => Digest::update(h, data),
        }
    }

    /// Finalize and return the hash as a lower-case hex string
    pub fn finalize(self) -> String {
        match self {
            StreamingHasher::Md5(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha1(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

// =============================================================================
// One-shot Hash Computation
// =============================================================================

/// Compute hash of data using specified algorithm (one-shot)
pub fn compute_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

// =============================================================================
// Hash Validation Utilities
// =============================================================================

/// Validate that a string looks like a valid hash for the given algorithm
pub fn is_valid_hash(hash: &str, algorithm: HashAlgorithm) -> bool {
    hash.len() == algorithm.hash_length() && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Result of hash comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HashMatchResult {
    /// Exact match (same case)
    Exact,
    /// Match but different case (e.g., "abc" vs "ABC")
    CaseInsensitive,
    /// Hashes do not match
    Mismatch,
    /// One or both hashes are invalid format
    Invalid,
}

impl HashMatchResult {
    /// Returns true if the hashes match (exact or case-insensitive)
    pub fn is_match(&self) -> bool {
        matches!(self, HashMatchResult::Exact | HashMatchResult::CaseInsensitive)
    }
}

/// Compare two hash strings with detailed result
pub fn compare_hashes(computed: &str, expected: &str) -> HashMatchResult {
    let computed = computed.trim();
    let expected = expected.trim();

    if !computed.chars().all(|c| c.is_ascii_hexdigit())
        || !expected.chars().all(|c| c.is_ascii_hexdigit())
    {
        return HashMatchResult::Invalid;
    }

    if computed.len() != expected.len() {
        return HashMatchResult::Mismatch;
    }

    if computed == expected {
        return HashMatchResult::Exact;
    }

    if computed.eq_ignore_ascii_case(expected) {
        return HashMatchResult::CaseInsensitive;
    }

    HashMatchResult::Mismatch
}
