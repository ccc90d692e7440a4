//! Error types for evidence ingestion and custody operations

use std::io;

use thiserror::Error;

/// Result type alias for custody operations
pub type CustodyResult<T> = Result<T, CustodyError>;

/// Errors surfaced by the ingestion pipeline, the content store and the ledger.
///
/// None of these are retried inside the crate. `CorruptionDetected` in
/// particular must reach a human: it means stored evidence no longer hashes
/// to the key it was filed under.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// Empty or oversized artifact, or an operation not allowed in the current state
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Ledger append against an evidence id that has no custody log
    #[error("Unknown evidence: {0}")]
    UnknownEvidence(String),

    /// Ledger append whose timestamp precedes the current head entry
    #[error("Out of order custody entry for {evidence_id}: {attempted} is before {previous}")]
    OutOfOrder {
        evidence_id: String,
        previous: String,
        attempted: String,
    },

    /// Optimistic append whose expected head no longer matches the ledger
    #[error("Sequence conflict for {evidence_id}: expected head {expected}, found {actual}")]
    SequenceConflict {
        evidence_id: String,
        expected: u64,
        actual: u64,
    },

    /// No blob stored under the requested key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored bytes no longer match their content address
    #[error("Corruption detected for {storage_key}: expected {expected}, computed {actual}")]
    CorruptionDetected {
        storage_key: String,
        expected: String,
        actual: String,
    },

    /// Byte storage backend I/O failure
    #[error("Storage error: {0}")]
    Storage(#[from] io::Error),

    /// Persistence collaborator failure
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Offloaded blocking task panicked or was cancelled
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl From<serde_json::Error> for CustodyError {
    fn from(err: serde_json::Error) -> Self {
        CustodyError::Config(err.to_string())
    }
}

impl CustodyError {
    /// Short stable code for audit logs and external error mapping
    pub fn code(&self) -> &'static str {
        match self {
            CustodyError::InvalidInput(_) => "INVALID_INPUT",
            CustodyError::UnknownEvidence(_) => "UNKNOWN_EVIDENCE",
            CustodyError::OutOfOrder { .. } => "OUT_OF_ORDER",
            CustodyError::SequenceConflict { .. } => "SEQUENCE_CONFLICT",
            CustodyError::NotFound(_) => "NOT_FOUND",
            CustodyError::CorruptionDetected { .. } => "CORRUPTION_DETECTED",
            CustodyError::Storage(_) => "STORAGE",
            CustodyError::Persistence(_) => "PERSISTENCE",
            CustodyError::Config(_) => "CONFIG",
            CustodyError::TaskFailed(_) => "TASK_FAILED",
        }
    }
}
