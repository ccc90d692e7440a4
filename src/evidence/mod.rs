//! Ingestion orchestrator
//!
//! Drives an upload through digest, scan and classification, commits the
//! bytes to the content store and opens the custody log. The same façade
//! records later access, verifies integrity, reprocesses and destroys.
//!
//! Analysis is pure and can be repeated; the commit step is where shared
//! state changes. An ingestion becomes durable the moment its `INGESTED`
//! entry is in the ledger.

pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::common::audit;
use crate::common::hash::{compare_hashes, HashAlgorithm};
use crate::config::CustodyConfig;
use crate::custody::{Actor, CustodyAction, CustodyEntry, CustodyLedger, EvidenceId};
use crate::error::{CustodyError, CustodyResult};
use crate::events::{CustodyEvent, CustodyObserver, ObserverRegistry};
use crate::forensics::{self, DigestSet, ForensicProfile, TextExtractor};
use crate::store::{ContentStore, StorageKey};

pub use types::{EvidenceRecord, EvidenceStatus, IngestRequest};

/// Outcome of [`EvidenceIngestor::reprocess`]
#[derive(Debug, Clone)]
pub struct Reprocessed {
    /// New ACTIVE record linked to the old one
    pub current: EvidenceRecord,
    /// The old record, now SUPERSEDED
    pub superseded: EvidenceRecord,
}

pub struct EvidenceIngestor {
    config: CustodyConfig,
    store: Arc<ContentStore>,
    ledger: Arc<CustodyLedger>,
    extractor: Option<Arc<dyn TextExtractor>>,
    observers: Arc<ObserverRegistry>,
    /// Reprocessed record -> successor; claimed before any work starts
    superseded: Mutex<HashMap<EvidenceId, EvidenceId>>,
}

impl EvidenceIngestor {
    /// Events go to the ledger's observer registry
    pub fn new(config: CustodyConfig, store: Arc<ContentStore>, ledger: Arc<CustodyLedger>) -> Self {
        let observers = Arc::clone(ledger.observers());
        Self {
            config,
            store,
            ledger,
            extractor: None,
            observers,
            superseded: Mutex::new(HashMap::new()),
        }
    }

    /// Ingestor over an in-memory store and a fresh ledger
    pub fn in_memory(config: CustodyConfig) -> Self {
        Self::new(
            config,
            Arc::new(ContentStore::in_memory()),
            Arc::new(CustodyLedger::new()),
        )
    }

    /// Enable keyword scoring
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn register_observer(&self, observer: Arc<dyn CustodyObserver>) {
        self.observers.register(observer);
    }

    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<CustodyLedger> {
        &self.ledger
    }

    fn check_size(&self, request: &IngestRequest) -> CustodyResult<()> {
        let size = request.data.len() as u64;
        let problem = if size == 0 {
            "empty artifact".to_string()
        } else if size > self.config.max_artifact_bytes {
            format!(
                "artifact is {} bytes, limit is {}",
                size, self.config.max_artifact_bytes
            )
        } else {
            return Ok(());
        };

        audit::log_rejected("ingest", &problem, &request.original_filename);
        Err(CustodyError::InvalidInput(format!(
            "{}: {}",
            request.original_filename, problem
        )))
    }

    /// Full ingestion: analyze then commit
    #[instrument(skip(self, request), fields(file = %request.original_filename, bytes = request.data.len()))]
    pub fn ingest(&self, request: IngestRequest) -> CustodyResult<EvidenceRecord> {
        self.check_size(&request)?;
        let profile = self.analyze(&request.data, &request.declared_mime_type);
        self.commit(&request, &profile)
    }

    /// Derive digests, signature, patterns and risk without touching shared state
    pub fn analyze(&self, data: &[u8], declared_mime_type: &str) -> ForensicProfile {
        forensics::analyze(data, declared_mime_type, self.extractor.as_deref())
    }

    /// Store the bytes and open the custody log for an analyzed request
    ///
    /// Can be retried with the same profile after a store failure. If the
    /// ledger open fails the store reference taken here is released.
    pub fn commit(&self, request: &IngestRequest, profile: &ForensicProfile) -> CustodyResult<EvidenceRecord> {
        self.commit_as(EvidenceId::new(), request, profile, None)
    }

    fn commit_as(
        &self,
        evidence_id: EvidenceId,
        request: &IngestRequest,
        profile: &ForensicProfile,
        supersedes: Option<EvidenceId>,
    ) -> CustodyResult<EvidenceRecord> {
        self.check_size(request)?;
        if profile.digest.size_bytes != request.data.len() as u64 {
            return Err(CustodyError::InvalidInput(format!(
                "profile covers {} bytes but request has {}",
                profile.digest.size_bytes,
                request.data.len()
            )));
        }

        let storage_key = self
            .store
            .put_with_digest(&request.data, &profile.digest.digests.sha256)?;

        let ingested_at = Utc::now();
        let opening = match self.ledger.open(
            evidence_id,
            &request.actor,
            ingested_at,
            request.notes.as_deref(),
        ) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(evidence_id = %evidence_id, error = %e, "Ledger open failed, releasing blob");
                if let Err(release_err) = self.store.release(&storage_key) {
                    warn!(key = %storage_key, error = %release_err, "Release after failed open also failed");
                }
                return Err(e);
            }
        };

        let record = build_record(evidence_id, request, profile, storage_key, opening, supersedes);

        audit::log_evidence_ingested(
            &record.evidence_id.to_string(),
            &record.case_ref,
            &record.digests.sha256,
            record.size_bytes,
            record.risk_level.as_str(),
            &request.actor.id,
        );
        self.observers.emit(&CustodyEvent::EvidenceIngested {
            record: Box::new(record.clone()),
        });

        info!(
            evidence_id = %record.evidence_id,
            signature = %record.detected_signature,
            risk = %record.risk_level,
            "Evidence ingested"
        );
        Ok(record)
    }

    /// Run [`ingest`](Self::ingest) on tokio's blocking pool
    pub async fn ingest_async(self: Arc<Self>, request: IngestRequest) -> CustodyResult<EvidenceRecord> {
        tokio::task::spawn_blocking(move || self.ingest(request))
            .await
            .map_err(|e| CustodyError::TaskFailed(e.to_string()))?
    }

    /// Ingest independent uploads in parallel, results in request order
    pub fn ingest_batch(&self, requests: Vec<IngestRequest>) -> Vec<CustodyResult<EvidenceRecord>> {
        debug!(count = requests.len(), "Batch ingestion");
        requests
            .into_par_iter()
            .map(|request| self.ingest(request))
            .collect()
    }

    /// Record that someone handled the evidence, stamped now
    pub fn record_access(
        &self,
        evidence_id: &EvidenceId,
        action: CustodyAction,
        actor: &Actor,
        notes: Option<&str>,
    ) -> CustodyResult<u64> {
        self.ledger.append_now(evidence_id, action, actor, notes)
    }

    /// Integrity-checked read that logs a `DOWNLOADED` entry
    pub fn retrieve(&self, record: &EvidenceRecord, actor: &Actor, notes: Option<&str>) -> CustodyResult<Vec<u8>> {
        let data = self.store.get(&record.storage_key)?;
        self.ledger
            .append_now(&record.evidence_id, CustodyAction::Downloaded, actor, notes)?;
        Ok(data)
    }

    /// Re-read the stored bytes and check every recorded digest
    ///
    /// Appends nothing to the ledger.
    pub fn verify_integrity(&self, record: &EvidenceRecord) -> CustodyResult<DigestSet> {
        let data = self.store.get(&record.storage_key)?;
        let recomputed = forensics::digest(&data).digests;

        for algorithm in HashAlgorithm::ALL {
            let expected = record.digests.get(algorithm);
            let actual = recomputed.get(algorithm);
            if !compare_hashes(actual, expected).is_match() {
                audit::log_integrity_failure(record.storage_key.as_str(), expected, actual);
                return Err(CustodyError::CorruptionDetected {
                    storage_key: record.storage_key.to_string(),
                    expected: format!("{} {}", algorithm.name(), expected),
                    actual: actual.to_string(),
                });
            }
        }

        debug!(evidence_id = %record.evidence_id, "Integrity verified");
        Ok(recomputed)
    }

    /// Re-analyze stored bytes into a new record that supersedes `previous`
    ///
    /// The old record gets an `ANALYZED` entry naming its successor and is
    /// returned with `SUPERSEDED` status; persisting that change is up to
    /// the caller. A record can be superseded once per ingestor, even when
    /// callers hold stale ACTIVE copies.
    #[instrument(skip(self, previous, actor, notes), fields(previous = %previous.evidence_id))]
    pub fn reprocess(
        &self,
        previous: &EvidenceRecord,
        actor: &Actor,
        notes: Option<&str>,
    ) -> CustodyResult<Reprocessed> {
        if !previous.is_active() {
            return Err(CustodyError::InvalidInput(format!(
                "Evidence {} is already {}",
                previous.evidence_id, previous.status
            )));
        }

        let successor = EvidenceId::new();
        {
            let mut superseded = self.superseded.lock();
            if let Some(existing) = superseded.get(&previous.evidence_id) {
                audit::log_rejected("reprocess", "already superseded", &previous.evidence_id.to_string());
                return Err(CustodyError::InvalidInput(format!(
                    "Evidence {} is already superseded by {}",
                    previous.evidence_id, existing
                )));
            }
            superseded.insert(previous.evidence_id, successor);
        }

        let result = self.reprocess_as(successor, previous, actor, notes);
        if result.is_err() {
            self.superseded.lock().remove(&previous.evidence_id);
        }
        result
    }

    fn reprocess_as(
        &self,
        successor: EvidenceId,
        previous: &EvidenceRecord,
        actor: &Actor,
        notes: Option<&str>,
    ) -> CustodyResult<Reprocessed> {
        let data = self.store.get(&previous.storage_key)?;
        let analyzed_note = match notes {
            Some(notes) => format!("Reprocessed as {}: {}", successor, notes),
            None => format!("Reprocessed as {}", successor),
        };
        self.ledger.append_now(
            &previous.evidence_id,
            CustodyAction::Analyzed,
            actor,
            Some(&analyzed_note),
        )?;

        let mut request = IngestRequest::new(
            data,
            previous.original_filename.clone(),
            previous.declared_mime_type.clone(),
            previous.case_ref.clone(),
            actor.clone(),
        );
        request.notes = Some(format!("Reprocessing of {}", previous.evidence_id));

        let profile = self.analyze(&request.data, &request.declared_mime_type);
        let current = self.commit_as(successor, &request, &profile, Some(previous.evidence_id))?;

        let mut superseded = previous.clone();
        superseded.status = EvidenceStatus::Superseded;
        superseded.custody_log = self.ledger.read(&previous.evidence_id)?;

        Ok(Reprocessed { current, superseded })
    }

    /// Successor of a record reprocessed through this ingestor
    pub fn superseded_by(&self, evidence_id: &EvidenceId) -> Option<EvidenceId> {
        self.superseded.lock().get(evidence_id).copied()
    }

    /// Log `DESTROYED` and drop this record's store reference
    ///
    /// Returns the references left on the blob. Bytes go away at the next
    /// garbage collection once nothing else points at them.
    pub fn destroy(&self, record: &EvidenceRecord, actor: &Actor, notes: Option<&str>) -> CustodyResult<u64> {
        self.ledger
            .append_now(&record.evidence_id, CustodyAction::Destroyed, actor, notes)?;
        self.store.release(&record.storage_key)
    }

    /// Authoritative custody history for a record
    pub fn custody_log(&self, evidence_id: &EvidenceId) -> CustodyResult<Vec<CustodyEntry>> {
        self.ledger.read(evidence_id)
    }
}

fn build_record(
    evidence_id: EvidenceId,
    request: &IngestRequest,
    profile: &ForensicProfile,
    storage_key: StorageKey,
    opening: CustodyEntry,
    supersedes: Option<EvidenceId>,
) -> EvidenceRecord {
    let signature = profile.scan.signature;
    EvidenceRecord {
        evidence_id,
        case_ref: request.case_ref.clone(),
        original_filename: request.original_filename.clone(),
        declared_mime_type: request.declared_mime_type.clone(),
        size_bytes: profile.digest.size_bytes,
        digests: profile.digest.digests.clone(),
        entropy: profile.digest.entropy,
        detected_signature: signature.signature,
        signature_confidence: signature.confidence,
        declared_mismatch: signature.declared_mismatch,
        suspicious_patterns: profile.scan.suspicious_patterns.clone(),
        keyword_hits: profile.keyword_hits.clone(),
        risk_score: profile.risk.score,
        risk_level: profile.risk.level,
        storage_key,
        ingested_at: opening.timestamp(),
        custody_log: vec![opening],
        status: EvidenceStatus::Active,
        supersedes,
    }
}
