//! Evidence forensic ingestion and chain-of-custody core
//!
//! Uploaded artifacts are digested (MD5, SHA-1, SHA-256, entropy), scanned
//! for file signatures and suspicious patterns, given a heuristic risk level,
//! stored once per distinct content, and tracked through an append-only
//! custody ledger.
//!
//! Risk levels are a triage aid for investigators, not a security verdict.
//!
//! ```no_run
//! use evidence_custody::{Actor, CustodyConfig, EvidenceIngestor, IngestRequest};
//!
//! let ingestor = EvidenceIngestor::in_memory(CustodyConfig::default());
//! let request = IngestRequest::new(
//!     std::fs::read("photo.jpg")?,
//!     "photo.jpg",
//!     "image/jpeg",
//!     "CASE-2024-001",
//!     Actor::new("officer-17", "Det. Rivera"),
//! );
//! let record = ingestor.ingest(request)?;
//! println!("{} {}", record.digests.sha256, record.risk_level);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod common;
pub mod config;
pub mod custody;
pub mod database;
pub mod error;
pub mod events;
pub mod evidence;
pub mod forensics;
pub mod logging;
pub mod store;

pub use config::CustodyConfig;
pub use custody::{Actor, CustodyAction, CustodyEntry, CustodyLedger, EvidenceId};
pub use database::EvidenceRepository;
pub use error::{CustodyError, CustodyResult};
pub use events::{AuditLogObserver, BroadcastObserver, CustodyEvent, CustodyObserver, ObserverRegistry};
pub use evidence::{EvidenceIngestor, EvidenceRecord, EvidenceStatus, IngestRequest, Reprocessed};
pub use forensics::{
    analyze, classify, digest, scan, DigestReport, DigestSet, ForensicProfile, PlainTextExtractor,
    RiskAssessment, RiskLevel, ScanReport, SuspiciousPattern, TextExtractor,
};
pub use store::{BlobBackend, ContentBlob, ContentStore, FsBackend, MemoryBackend, StorageKey};
