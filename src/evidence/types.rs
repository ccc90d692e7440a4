//! Evidence record and ingestion request types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::magic::{Confidence, FileSignature};
use crate::custody::types::{Actor, CustodyEntry, EvidenceId};
use crate::forensics::{DigestSet, RiskLevel, SuspiciousPattern};
use crate::store::StorageKey;

/// Whether a record is the current analysis of its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceStatus {
    Active,
    Superseded,
}

impl EvidenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceStatus::Active => "ACTIVE",
            EvidenceStatus::Superseded => "SUPERSEDED",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "ACTIVE" => Some(EvidenceStatus::Active),
            "SUPERSEDED" => Some(EvidenceStatus::Superseded),
            _ => None,
        }
    }
}

impl fmt::Display for EvidenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingested artifact and everything derived from it
///
/// `custody_log` is a snapshot taken when the record was produced; the
/// ledger is authoritative for anything appended later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub evidence_id: EvidenceId,
    /// Owning case, stored as given
    pub case_ref: String,
    pub original_filename: String,
    /// Caller supplied, never trusted for classification
    pub declared_mime_type: String,
    pub size_bytes: u64,
    pub digests: DigestSet,
    pub entropy: f64,
    pub detected_signature: FileSignature,
    pub signature_confidence: Confidence,
    pub declared_mismatch: bool,
    pub suspicious_patterns: Vec<SuspiciousPattern>,
    pub keyword_hits: Vec<String>,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub storage_key: StorageKey,
    pub custody_log: Vec<CustodyEntry>,
    pub status: EvidenceStatus,
    /// Record this one replaced through reprocessing
    pub supersedes: Option<EvidenceId>,
    pub ingested_at: DateTime<Utc>,
}

impl EvidenceRecord {
    pub fn is_active(&self) -> bool {
        self.status == EvidenceStatus::Active
    }
}

/// An upload waiting to be ingested
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub data: Vec<u8>,
    pub original_filename: String,
    pub declared_mime_type: String,
    pub case_ref: String,
    pub actor: Actor,
    pub notes: Option<String>,
}

impl IngestRequest {
    pub fn new(
        data: impl Into<Vec<u8>>,
        original_filename: impl Into<String>,
        declared_mime_type: impl Into<String>,
        case_ref: impl Into<String>,
        actor: Actor,
    ) -> Self {
        Self {
            data: data.into(),
            original_filename: original_filename.into(),
            declared_mime_type: declared_mime_type.into(),
            case_ref: case_ref.into(),
            actor,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tags() {
        assert_eq!(EvidenceStatus::parse("ACTIVE"), Some(EvidenceStatus::Active));
        assert_eq!(EvidenceStatus::Superseded.to_string(), "SUPERSEDED");
        assert_eq!(EvidenceStatus::parse("active"), None);
    }

    #[test]
    fn test_request_builder() {
        let request = IngestRequest::new(
            b"bytes".to_vec(),
            "photo.jpg",
            "image/jpeg",
            "CASE-2024-001",
            Actor::new("u1", "Intake Officer"),
        )
        .with_notes("seized phone export");
        assert_eq!(request.data, b"bytes");
        assert_eq!(request.notes.as_deref(), Some("seized phone export"));
    }
}
