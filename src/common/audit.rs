//! Forensic Audit Logging
//!
//! Structured `forensic_audit` events for chain of custody compliance.
//! These complement the ledger; the ledger stays the authoritative record.

use tracing::{error, info, warn};

/// Log a completed ingestion
pub fn log_evidence_ingested(
    evidence_id: &str,
    case_ref: &str,
    sha256: &str,
    size_bytes: u64,
    risk_level: &str,
    actor_id: &str,
) {
    info!(
        target: "forensic_audit",
        operation = "ingest",
        evidence_id = evidence_id,
        case_ref = case_ref,
        sha256 = sha256,
        size_bytes = size_bytes,
        risk_level = risk_level,
        actor_id = actor_id,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Evidence ingested"
    );
}

/// Log a custody ledger append
pub fn log_custody_appended(evidence_id: &str, sequence: u64, action: &str, actor_id: &str) {
    info!(
        target: "forensic_audit",
        operation = "custody_append",
        evidence_id = evidence_id,
        sequence = sequence,
        action = action,
        actor_id = actor_id,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Custody entry appended"
    );
}

/// Log stored bytes that no longer hash to their content address
pub fn log_integrity_failure(storage_key: &str, expected: &str, actual: &str) {
    error!(
        target: "forensic_audit",
        operation = "integrity_check",
        storage_key = storage_key,
        expected_hash = expected,
        computed_hash = actual,
        status = "CORRUPTED",
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Evidence integrity failure"
    );
}

/// Log a content reference release
pub fn log_blob_released(storage_key: &str, remaining: u64) {
    info!(
        target: "forensic_audit",
        operation = "blob_release",
        storage_key = storage_key,
        remaining_refs = remaining,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Content reference released"
    );
}

/// Log physical deletion of an unreferenced blob
pub fn log_blob_collected(storage_key: &str, byte_length: u64) {
    info!(
        target: "forensic_audit",
        operation = "blob_collect",
        storage_key = storage_key,
        byte_length = byte_length,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Unreferenced content deleted"
    );
}

/// Log a rejected upload or custody operation
pub fn log_rejected(event_type: &str, description: &str, subject: &str) {
    warn!(
        target: "forensic_audit",
        event_type = "rejected",
        rejected_operation = event_type,
        description = description,
        subject = subject,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Operation rejected"
    );
}
