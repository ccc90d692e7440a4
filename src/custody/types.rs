//! Chain of custody data types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CustodyError, CustodyResult};

/// Opaque evidence identifier assigned at ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceId(Uuid);

impl EvidenceId {
    pub fn new() -> Self {
        EvidenceId(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> CustodyResult<Self> {
        Uuid::parse_str(value.trim())
            .map(EvidenceId)
            .map_err(|e| CustodyError::InvalidInput(format!("Invalid evidence id '{}': {}", value, e)))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EvidenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Something that can happen to a piece of evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustodyAction {
    Ingested,
    Viewed,
    Downloaded,
    Analyzed,
    Transferred,
    Destroyed,
}

impl CustodyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustodyAction::Ingested => "INGESTED",
            CustodyAction::Viewed => "VIEWED",
            CustodyAction::Downloaded => "DOWNLOADED",
            CustodyAction::Analyzed => "ANALYZED",
            CustodyAction::Transferred => "TRANSFERRED",
            CustodyAction::Destroyed => "DESTROYED",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "INGESTED" => Some(CustodyAction::Ingested),
            "VIEWED" => Some(CustodyAction::Viewed),
            "DOWNLOADED" => Some(CustodyAction::Downloaded),
            "ANALYZED" => Some(CustodyAction::Analyzed),
            "TRANSFERRED" => Some(CustodyAction::Transferred),
            "DESTROYED" => Some(CustodyAction::Destroyed),
            _ => None,
        }
    }
}

impl fmt::Display for CustodyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed a custody action; identifiers are opaque to this crate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// One immutable entry in an evidence item's custody log
///
/// Fields are read-only; entries are only created by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyEntry {
    sequence: u64,
    action: CustodyAction,
    actor_id: String,
    actor_display_name: String,
    timestamp: DateTime<Utc>,
    notes: Option<String>,
}

impl CustodyEntry {
    pub(crate) fn new(
        sequence: u64,
        action: CustodyAction,
        actor: &Actor,
        timestamp: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Self {
        Self {
            sequence,
            action,
            actor_id: actor.id.clone(),
            actor_display_name: actor.display_name.clone(),
            timestamp,
            notes: notes.map(str::to_owned),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn action(&self) -> CustodyAction {
        self.action
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn actor_display_name(&self) -> &str {
        &self.actor_display_name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

/// Check that a sequence of entries forms a valid custody log
pub fn validate_log(evidence_id: &EvidenceId, entries: &[CustodyEntry]) -> CustodyResult<()> {
    let first = entries
        .first()
        .ok_or_else(|| CustodyError::InvalidInput(format!("Empty custody log for {}", evidence_id)))?;
    if first.action != CustodyAction::Ingested {
        return Err(CustodyError::InvalidInput(format!(
            "Custody log for {} starts with {} instead of INGESTED",
            evidence_id, first.action
        )));
    }

    for pair in entries.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.action == CustodyAction::Ingested || previous.action == CustodyAction::Destroyed {
            return Err(CustodyError::InvalidInput(format!(
                "Custody log for {} has {} after {} at sequence {}",
                evidence_id, current.action, previous.action, current.sequence
            )));
        }
        if current.timestamp < previous.timestamp {
            return Err(CustodyError::OutOfOrder {
                evidence_id: evidence_id.to_string(),
                previous: previous.timestamp.to_rfc3339(),
                attempted: current.timestamp.to_rfc3339(),
            });
        }
    }

    for (expected, entry) in entries.iter().enumerate() {
        if entry.sequence != expected as u64 {
            return Err(CustodyError::InvalidInput(format!(
                "Custody log for {} has sequence {} at position {}",
                evidence_id, entry.sequence, expected
            )));
        }
    }

    Ok(())
}
