//! Append-only chain-of-custody ledger
//!
//! The ledger is the authoritative custody history. Each evidence record has
//! its own log guarded by its own mutex, so appends to different records run
//! concurrently while appends to one record are totally ordered.
//!
//! There is no update or delete operation. Readers always get an owned copy.
//!
//! Observers are notified while the appended record's lock is held, so an
//! observer that calls back into the ledger for the same record deadlocks.

pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::common::audit;
use crate::error::{CustodyError, CustodyResult};
use crate::events::{CustodyEvent, ObserverRegistry};

pub use types::{validate_log, Actor, CustodyAction, CustodyEntry, EvidenceId};

type RecordLog = Arc<Mutex<Vec<CustodyEntry>>>;

pub struct CustodyLedger {
    logs: RwLock<HashMap<EvidenceId, RecordLog>>,
    observers: Arc<ObserverRegistry>,
}

impl Default for CustodyLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl CustodyLedger {
    pub fn new() -> Self {
        Self::with_observers(Arc::new(ObserverRegistry::new()))
    }

    pub fn with_observers(observers: Arc<ObserverRegistry>) -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            observers,
        }
    }

    pub fn observers(&self) -> &Arc<ObserverRegistry> {
        &self.observers
    }

    fn log_for(&self, evidence_id: &EvidenceId) -> CustodyResult<RecordLog> {
        self.logs
            .read()
            .get(evidence_id)
            .cloned()
            .ok_or_else(|| CustodyError::UnknownEvidence(evidence_id.to_string()))
    }

    /// Start a record's log with its `INGESTED` entry
    pub(crate) fn open(
        &self,
        evidence_id: EvidenceId,
        actor: &Actor,
        timestamp: DateTime<Utc>,
        notes: Option<&str>,
    ) -> CustodyResult<CustodyEntry> {
        let entry = CustodyEntry::new(0, CustodyAction::Ingested, actor, timestamp, notes);

        let mut logs = self.logs.write();
        if logs.contains_key(&evidence_id) {
            return Err(CustodyError::InvalidInput(format!(
                "Custody log for {} already exists",
                evidence_id
            )));
        }
        logs.insert(evidence_id, Arc::new(Mutex::new(vec![entry.clone()])));
        drop(logs);

        audit::log_custody_appended(&evidence_id.to_string(), 0, entry.action().as_str(), actor.id.as_str());
        Ok(entry)
    }

    /// Load a previously persisted log, e.g. from the evidence repository
    pub fn restore(&self, evidence_id: EvidenceId, entries: Vec<CustodyEntry>) -> CustodyResult<()> {
        validate_log(&evidence_id, &entries)?;

        let mut logs = self.logs.write();
        if logs.contains_key(&evidence_id) {
            return Err(CustodyError::InvalidInput(format!(
                "Custody log for {} already exists",
                evidence_id
            )));
        }
        debug!(evidence_id = %evidence_id, entries = entries.len(), "Custody log restored");
        logs.insert(evidence_id, Arc::new(Mutex::new(entries)));
        Ok(())
    }

    /// Append an entry after the current head, returning its sequence
    pub fn append(
        &self,
        evidence_id: &EvidenceId,
        action: CustodyAction,
        actor: &Actor,
        timestamp: DateTime<Utc>,
        notes: Option<&str>,
    ) -> CustodyResult<u64> {
        self.append_inner(evidence_id, None, action, actor, Some(timestamp), notes)
    }

    /// Append stamped with the current time, read while holding the record lock
    ///
    /// A clock that stepped backwards is clamped to the head's timestamp.
    pub fn append_now(
        &self,
        evidence_id: &EvidenceId,
        action: CustodyAction,
        actor: &Actor,
        notes: Option<&str>,
    ) -> CustodyResult<u64> {
        self.append_inner(evidence_id, None, action, actor, None, notes)
    }

    /// Append only if the head is still `expected_head`
    ///
    /// Fails with `SequenceConflict` when another writer got there first.
    pub fn append_expecting(
        &self,
        evidence_id: &EvidenceId,
        expected_head: u64,
        action: CustodyAction,
        actor: &Actor,
        timestamp: DateTime<Utc>,
        notes: Option<&str>,
    ) -> CustodyResult<u64> {
        self.append_inner(evidence_id, Some(expected_head), action, actor, Some(timestamp), notes)
    }

    fn append_inner(
        &self,
        evidence_id: &EvidenceId,
        expected_head: Option<u64>,
        action: CustodyAction,
        actor: &Actor,
        timestamp: Option<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> CustodyResult<u64> {
        if action == CustodyAction::Ingested {
            return Err(CustodyError::InvalidInput(
                "INGESTED only opens a custody log".to_string(),
            ));
        }

        let log = self.log_for(evidence_id)?;
        let mut entries = log.lock();
        let head = entries
            .last()
            .ok_or_else(|| CustodyError::UnknownEvidence(evidence_id.to_string()))?;

        if let Some(expected) = expected_head {
            if head.sequence() != expected {
                return Err(CustodyError::SequenceConflict {
                    evidence_id: evidence_id.to_string(),
                    expected,
                    actual: head.sequence(),
                });
            }
        }

        if head.action() == CustodyAction::Destroyed {
            audit::log_rejected("custody_append", "append after DESTROYED", &evidence_id.to_string());
            return Err(CustodyError::InvalidInput(format!(
                "Evidence {} was destroyed at sequence {}",
                evidence_id,
                head.sequence()
            )));
        }

        let timestamp = timestamp.unwrap_or_else(|| Utc::now().max(head.timestamp()));
        if timestamp < head.timestamp() {
            warn!(evidence_id = %evidence_id, action = %action, "Rejected out of order custody entry");
            return Err(CustodyError::OutOfOrder {
                evidence_id: evidence_id.to_string(),
                previous: head.timestamp().to_rfc3339(),
                attempted: timestamp.to_rfc3339(),
            });
        }

        let sequence = head.sequence() + 1;
        let entry = CustodyEntry::new(sequence, action, actor, timestamp, notes);
        entries.push(entry.clone());

        audit::log_custody_appended(&evidence_id.to_string(), sequence, action.as_str(), actor.id.as_str());
        self.observers.emit(&CustodyEvent::CustodyAppended {
            evidence_id: *evidence_id,
            entry,
        });
        Ok(sequence)
    }

    /// Owned snapshot of a record's log
    pub fn read(&self, evidence_id: &EvidenceId) -> CustodyResult<Vec<CustodyEntry>> {
        let log = self.log_for(evidence_id)?;
        let entries = log.lock();
        Ok(entries.clone())
    }

    /// Latest entry of a record's log
    pub fn head(&self, evidence_id: &EvidenceId) -> CustodyResult<CustodyEntry> {
        let log = self.log_for(evidence_id)?;
        let entries = log.lock();
        entries
            .last()
            .cloned()
            .ok_or_else(|| CustodyError::UnknownEvidence(evidence_id.to_string()))
    }

    pub fn contains(&self, evidence_id: &EvidenceId) -> bool {
        self.logs.read().contains_key(evidence_id)
    }

    /// Number of records with a custody log
    pub fn len(&self) -> usize {
        self.logs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.read().is_empty()
    }
}
