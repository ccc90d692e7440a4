//! Custody notifications for audit and downstream consumers
//!
//! Observers are called synchronously from the thread that produced the
//! event. The ledger emits append events while holding the record's lock,
//! so each record's events arrive in sequence order.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, trace};

use crate::custody::types::{CustodyEntry, EvidenceId};
use crate::evidence::types::EvidenceRecord;

/// Something observable happened to a piece of evidence
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustodyEvent {
    EvidenceIngested { record: Box<EvidenceRecord> },
    CustodyAppended { evidence_id: EvidenceId, entry: CustodyEntry },
}

impl CustodyEvent {
    pub fn evidence_id(&self) -> EvidenceId {
        match self {
            CustodyEvent::EvidenceIngested { record } => record.evidence_id,
            CustodyEvent::CustodyAppended { evidence_id, .. } => *evidence_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CustodyEvent::EvidenceIngested { .. } => "EVIDENCE_INGESTED",
            CustodyEvent::CustodyAppended { .. } => "CUSTODY_APPENDED",
        }
    }
}

/// Receives custody events; implementations must not block for long
///
/// `CUSTODY_APPENDED` is delivered while the ledger holds that record's
/// lock, which is not reentrant. An observer must not append to, read or
/// otherwise touch the record named by the event from inside `notify`, or
/// it deadlocks. Hand such work to another thread (for example through
/// [`BroadcastObserver`]). Other records may be appended to.
pub trait CustodyObserver: Send + Sync {
    fn notify(&self, event: &CustodyEvent);
}

/// Fan-out list of observers shared by the ledger and the orchestrator
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn CustodyObserver>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<dyn CustodyObserver>) {
        self.observers.write().push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub fn emit(&self, event: &CustodyEvent) {
        let observers = self.observers.read();
        trace!(kind = event.kind(), observers = observers.len(), "Emitting custody event");
        for observer in observers.iter() {
            observer.notify(event);
        }
    }
}

/// Forwards events to a tokio broadcast channel for async consumers
///
/// Sending with no live receivers is not an error; the event is dropped.
pub struct BroadcastObserver {
    sender: broadcast::Sender<CustodyEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CustodyEvent> {
        self.sender.subscribe()
    }
}

impl CustodyObserver for BroadcastObserver {
    fn notify(&self, event: &CustodyEvent) {
        let _ = self.sender.send(event.clone());
    }
}

/// Writes every event to the `forensic_audit` tracing target as JSON
#[derive(Debug, Default)]
pub struct AuditLogObserver;

impl CustodyObserver for AuditLogObserver {
    fn notify(&self, event: &CustodyEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        info!(
            target: "forensic_audit",
            operation = "event",
            kind = event.kind(),
            evidence_id = %event.evidence_id(),
            payload = %payload,
            "Custody event"
        );
    }
}
