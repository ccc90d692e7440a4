//! SQLite persistence for evidence records and custody logs
//!
//! Handles:
//! - Evidence records (immutable analysis results, one status transition)
//! - Custody entries (append-only, contiguous sequences per record)
//!
//! Append-only rules are enforced twice: the methods here only ever insert,
//! and schema triggers abort any UPDATE or DELETE that would rewrite history.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::common::magic::{Confidence, FileSignature};
use crate::custody::{Actor, CustodyAction, CustodyEntry, EvidenceId};
use crate::error::{CustodyError, CustodyResult};
use crate::evidence::{EvidenceRecord, EvidenceStatus};
use crate::forensics::{DigestSet, RiskLevel, SuspiciousPattern};
use crate::store::{ContentBlob, StorageKey};

/// Database connection wrapper for thread-safe access
pub struct EvidenceRepository {
    conn: Mutex<Connection>,
}

const RECORD_COLUMNS: &str = "evidence_id, case_ref, original_filename, declared_mime_type, size_bytes,
     md5, sha1, sha256, entropy, detected_signature, signature_confidence, declared_mismatch,
     suspicious_patterns, keyword_hits, risk_score, risk_level, storage_key, status, supersedes, ingested_at";

// ============================================================================
// Column Encoding
// ============================================================================

/// Fixed-width RFC 3339 so text order matches time order
fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

fn decode_time(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, format!("bad timestamp '{}': {}", value, e)))
}

fn decode_id(column: usize, value: &str) -> rusqlite::Result<EvidenceId> {
    EvidenceId::parse(value).map_err(|e| conversion_error(column, e.to_string()))
}

fn decode_tag<T>(column: usize, value: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(value).ok_or_else(|| conversion_error(column, format!("unknown tag '{}'", value)))
}

fn encode_list<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    items.into_iter().collect::<Vec<_>>().join(",")
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').filter(|s| !s.is_empty())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<EvidenceRecord> {
    let evidence_id: String = row.get(0)?;
    let size_bytes: i64 = row.get(4)?;
    let signature: String = row.get(9)?;
    let confidence: String = row.get(10)?;
    let patterns: String = row.get(12)?;
    let keywords: String = row.get(13)?;
    let risk_score: i64 = row.get(14)?;
    let risk_level: String = row.get(15)?;
    let storage_key: String = row.get(16)?;
    let status: String = row.get(17)?;
    let supersedes: Option<String> = row.get(18)?;
    let ingested_at: String = row.get(19)?;

    let suspicious_patterns = split_list(&patterns)
        .map(|tag| decode_tag(12, tag, SuspiciousPattern::parse))
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(EvidenceRecord {
        evidence_id: decode_id(0, &evidence_id)?,
        case_ref: row.get(1)?,
        original_filename: row.get(2)?,
        declared_mime_type: row.get(3)?,
        size_bytes: size_bytes as u64,
        digests: DigestSet {
            md5: row.get(5)?,
            sha1: row.get(6)?,
            sha256: row.get(7)?,
        },
        entropy: row.get(8)?,
        detected_signature: decode_tag(9, &signature, FileSignature::parse)?,
        signature_confidence: decode_tag(10, &confidence, Confidence::parse)?,
        declared_mismatch: row.get(11)?,
        suspicious_patterns,
        keyword_hits: split_list(&keywords).map(str::to_owned).collect(),
        risk_score: risk_score as u32,
        risk_level: decode_tag(15, &risk_level, RiskLevel::parse)?,
        storage_key: StorageKey::from_sha256(&storage_key).map_err(|e| conversion_error(16, e.to_string()))?,
        custody_log: Vec::new(),
        status: decode_tag(17, &status, EvidenceStatus::parse)?,
        supersedes: supersedes.as_deref().map(|s| decode_id(18, s)).transpose()?,
        ingested_at: decode_time(19, &ingested_at)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CustodyEntry> {
    let sequence: i64 = row.get(0)?;
    let action: String = row.get(1)?;
    let actor = Actor::new(row.get::<_, String>(2)?, row.get::<_, String>(3)?);
    let timestamp: String = row.get(4)?;
    let notes: Option<String> = row.get(5)?;

    Ok(CustodyEntry::new(
        sequence as u64,
        decode_tag(1, &action, CustodyAction::parse)?,
        &actor,
        decode_time(4, &timestamp)?,
        notes.as_deref(),
    ))
}

fn insert_entry(conn: &Connection, evidence_id: &EvidenceId, entry: &CustodyEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO custody_entries (evidence_id, sequence, action, actor_id, actor_display_name, timestamp, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            evidence_id.to_string(),
            entry.sequence() as i64,
            entry.action().as_str(),
            entry.actor_id(),
            entry.actor_display_name(),
            encode_time(&entry.timestamp()),
            entry.notes(),
        ],
    )?;
    Ok(())
}

fn load_entries(conn: &Connection, evidence_id: &EvidenceId) -> rusqlite::Result<Vec<CustodyEntry>> {
    let mut stmt = conn.prepare(
        "SELECT sequence, action, actor_id, actor_display_name, timestamp, notes
         FROM custody_entries WHERE evidence_id = ?1 ORDER BY sequence",
    )?;
    let rows = stmt.query_map(params![evidence_id.to_string()], entry_from_row)?;
    rows.collect()
}

fn record_exists(conn: &Connection, evidence_id: &EvidenceId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM evidence_records WHERE evidence_id = ?1)",
        params![evidence_id.to_string()],
        |row| row.get(0),
    )
}

// ============================================================================
// Repository Implementation
// ============================================================================

impl EvidenceRepository {
    /// Open (or create) the database file, creating tables if needed
    pub fn open(db_path: &Path) -> CustodyResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        info!(path = %db_path.display(), "Evidence repository opened");
        Self::with_connection(conn)
    }

    /// Private database for tests and ephemeral runs
    pub fn in_memory() -> CustodyResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> CustodyResult<Self> {
        let repo = EvidenceRepository {
            conn: Mutex::new(conn),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    /// Create all tables and guards if they don't exist
    fn init_schema(&self) -> CustodyResult<()> {
        let conn = self.conn.lock();

        conn.execute_batch(r#"
            PRAGMA foreign_keys = ON;

            -- Evidence records (analysis results, immutable apart from status)
            CREATE TABLE IF NOT EXISTS evidence_records (
                evidence_id TEXT PRIMARY KEY,
                case_ref TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                declared_mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                md5 TEXT NOT NULL,
                sha1 TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                entropy REAL NOT NULL,
                detected_signature TEXT NOT NULL,
                signature_confidence TEXT NOT NULL,
                declared_mismatch INTEGER NOT NULL,
                suspicious_patterns TEXT NOT NULL,
                keyword_hits TEXT NOT NULL,
                risk_score INTEGER NOT NULL,
                risk_level TEXT NOT NULL,
                storage_key TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('ACTIVE', 'SUPERSEDED')),
                supersedes TEXT,
                superseded_by TEXT,
                ingested_at TEXT NOT NULL
            );

            -- Custody entries (append-only audit trail)
            CREATE TABLE IF NOT EXISTS custody_entries (
                evidence_id TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                action TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                actor_display_name TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                notes TEXT,
                PRIMARY KEY (evidence_id, sequence),
                FOREIGN KEY (evidence_id) REFERENCES evidence_records(evidence_id)
            );

            CREATE TRIGGER IF NOT EXISTS custody_entries_no_update
            BEFORE UPDATE ON custody_entries
            BEGIN
                SELECT RAISE(ABORT, 'custody entries are append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS custody_entries_no_delete
            BEFORE DELETE ON custody_entries
            BEGIN
                SELECT RAISE(ABORT, 'custody entries are append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS evidence_records_no_delete
            BEFORE DELETE ON evidence_records
            BEGIN
                SELECT RAISE(ABORT, 'evidence records cannot be deleted');
            END;

            -- Only ACTIVE -> SUPERSEDED with a successor may change a record
            CREATE TRIGGER IF NOT EXISTS evidence_records_immutable
            BEFORE UPDATE ON evidence_records
            WHEN OLD.status <> 'ACTIVE'
              OR NEW.status <> 'SUPERSEDED'
              OR NEW.superseded_by IS NULL
              OR NEW.evidence_id IS NOT OLD.evidence_id
              OR NEW.case_ref IS NOT OLD.case_ref
              OR NEW.original_filename IS NOT OLD.original_filename
              OR NEW.declared_mime_type IS NOT OLD.declared_mime_type
              OR NEW.size_bytes IS NOT OLD.size_bytes
              OR NEW.md5 IS NOT OLD.md5
              OR NEW.sha1 IS NOT OLD.sha1
              OR NEW.sha256 IS NOT OLD.sha256
              OR NEW.entropy IS NOT OLD.entropy
              OR NEW.detected_signature IS NOT OLD.detected_signature
              OR NEW.signature_confidence IS NOT OLD.signature_confidence
              OR NEW.declared_mismatch IS NOT OLD.declared_mismatch
              OR NEW.suspicious_patterns IS NOT OLD.suspicious_patterns
              OR NEW.keyword_hits IS NOT OLD.keyword_hits
              OR NEW.risk_score IS NOT OLD.risk_score
              OR NEW.risk_level IS NOT OLD.risk_level
              OR NEW.storage_key IS NOT OLD.storage_key
              OR NEW.supersedes IS NOT OLD.supersedes
              OR NEW.ingested_at IS NOT OLD.ingested_at
            BEGIN
                SELECT RAISE(ABORT, 'evidence records are immutable');
            END;

            -- Indexes for common queries
            CREATE INDEX IF NOT EXISTS idx_records_case ON evidence_records(case_ref);
            CREATE INDEX IF NOT EXISTS idx_records_storage_key ON evidence_records(storage_key);
        "#)?;

        Ok(())
    }

    // ========================================================================
    // Record Operations
    // ========================================================================

    /// Insert a new record together with its custody snapshot
    pub fn save_record(&self, record: &EvidenceRecord) -> CustodyResult<()> {
        crate::custody::validate_log(&record.evidence_id, &record.custody_log)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO evidence_records ({}) VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                RECORD_COLUMNS
            ),
            params![
                record.evidence_id.to_string(),
                record.case_ref,
                record.original_filename,
                record.declared_mime_type,
                record.size_bytes as i64,
                record.digests.md5,
                record.digests.sha1,
                record.digests.sha256,
                record.entropy,
                record.detected_signature.as_str(),
                record.signature_confidence.as_str(),
                record.declared_mismatch,
                encode_list(record.suspicious_patterns.iter().map(|p| p.as_str())),
                encode_list(record.keyword_hits.iter().map(String::as_str)),
                record.risk_score as i64,
                record.risk_level.as_str(),
                record.storage_key.as_str(),
                record.status.as_str(),
                record.supersedes.map(|id| id.to_string()),
                encode_time(&record.ingested_at),
            ],
        )?;
        for entry in &record.custody_log {
            insert_entry(&tx, &record.evidence_id, entry)?;
        }
        tx.commit()?;

        debug!(evidence_id = %record.evidence_id, entries = record.custody_log.len(), "Evidence record saved");
        Ok(())
    }

    /// Record that `evidence_id` was replaced by `superseded_by`
    ///
    /// The only update a record ever receives; allowed once, from ACTIVE.
    pub fn mark_superseded(&self, evidence_id: &EvidenceId, superseded_by: &EvidenceId) -> CustodyResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE evidence_records SET status = 'SUPERSEDED', superseded_by = ?2
             WHERE evidence_id = ?1 AND status = 'ACTIVE'",
            params![evidence_id.to_string(), superseded_by.to_string()],
        )?;

        if changed == 0 {
            if !record_exists(&conn, evidence_id)? {
                return Err(CustodyError::UnknownEvidence(evidence_id.to_string()));
            }
            return Err(CustodyError::InvalidInput(format!(
                "Evidence {} is already superseded",
                evidence_id
            )));
        }
        Ok(())
    }

    /// Record with its full persisted custody log
    pub fn load_record(&self, evidence_id: &EvidenceId) -> CustodyResult<Option<EvidenceRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("SELECT {} FROM evidence_records WHERE evidence_id = ?1", RECORD_COLUMNS),
                params![evidence_id.to_string()],
                record_from_row,
            )
            .optional()?;

        match record {
            Some(mut record) => {
                record.custody_log = load_entries(&conn, evidence_id)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Successor recorded by [`mark_superseded`](Self::mark_superseded)
    pub fn superseded_by(&self, evidence_id: &EvidenceId) -> CustodyResult<Option<EvidenceId>> {
        let conn = self.conn.lock();
        let value: Option<Option<String>> = conn
            .query_row(
                "SELECT superseded_by FROM evidence_records WHERE evidence_id = ?1",
                params![evidence_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            None => Err(CustodyError::UnknownEvidence(evidence_id.to_string())),
            Some(None) => Ok(None),
            Some(Some(id)) => Ok(Some(EvidenceId::parse(&id)?)),
        }
    }

    /// Every record filed under a case, oldest first
    pub fn list_by_case(&self, case_ref: &str) -> CustodyResult<Vec<EvidenceRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM evidence_records WHERE case_ref = ?1 ORDER BY ingested_at, evidence_id",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![case_ref], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        records
            .into_iter()
            .map(|mut record| -> CustodyResult<EvidenceRecord> {
                record.custody_log = load_entries(&conn, &record.evidence_id)?;
                Ok(record)
            })
            .collect()
    }

    /// Reference counts per stored payload, for [`ContentStore::restore`]
    ///
    /// Every record holds one reference until its log reaches `DESTROYED`.
    /// Payloads whose records were all destroyed come back with zero
    /// references.
    ///
    /// [`ContentStore::restore`]: crate::store::ContentStore::restore
    pub fn blob_references(&self) -> CustodyResult<Vec<ContentBlob>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT r.storage_key, MAX(r.size_bytes),
                    SUM(CASE WHEN EXISTS (
                        SELECT 1 FROM custody_entries c
                        WHERE c.evidence_id = r.evidence_id AND c.action = 'DESTROYED'
                    ) THEN 0 ELSE 1 END)
             FROM evidence_records r
             GROUP BY r.storage_key
             ORDER BY r.storage_key",
        )?;
        let rows = stmt.query_map([], |row| {
            let storage_key: String = row.get(0)?;
            let byte_length: i64 = row.get(1)?;
            let ref_count: i64 = row.get(2)?;
            Ok(ContentBlob {
                storage_key: StorageKey::from_sha256(&storage_key).map_err(|e| conversion_error(0, e.to_string()))?,
                byte_length: byte_length as u64,
                ref_count: ref_count as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ========================================================================
    // Custody Operations
    // ========================================================================

    /// Persist one ledger entry after the stored head
    pub fn append_entry(&self, evidence_id: &EvidenceId, entry: &CustodyEntry) -> CustodyResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let head = tx
            .query_row(
                "SELECT sequence, action, actor_id, actor_display_name, timestamp, notes
                 FROM custody_entries WHERE evidence_id = ?1 ORDER BY sequence DESC LIMIT 1",
                params![evidence_id.to_string()],
                entry_from_row,
            )
            .optional()?
            .ok_or_else(|| CustodyError::UnknownEvidence(evidence_id.to_string()))?;

        if entry.action() == CustodyAction::Ingested {
            return Err(CustodyError::InvalidInput(
                "INGESTED only opens a custody log".to_string(),
            ));
        }
        if head.action() == CustodyAction::Destroyed {
            return Err(CustodyError::InvalidInput(format!(
                "Evidence {} was destroyed at sequence {}",
                evidence_id,
                head.sequence()
            )));
        }
        if entry.sequence() != head.sequence() + 1 {
            return Err(CustodyError::SequenceConflict {
                evidence_id: evidence_id.to_string(),
                expected: entry.sequence().saturating_sub(1),
                actual: head.sequence(),
            });
        }
        if entry.timestamp() < head.timestamp() {
            return Err(CustodyError::OutOfOrder {
                evidence_id: evidence_id.to_string(),
                previous: head.timestamp().to_rfc3339(),
                attempted: entry.timestamp().to_rfc3339(),
            });
        }

        insert_entry(&tx, evidence_id, entry)?;
        tx.commit()?;
        Ok(())
    }

    /// Persisted custody log, `UnknownEvidence` when the record is missing
    pub fn custody_log(&self, evidence_id: &EvidenceId) -> CustodyResult<Vec<CustodyEntry>> {
        let conn = self.conn.lock();
        if !record_exists(&conn, evidence_id)? {
            return Err(CustodyError::UnknownEvidence(evidence_id.to_string()));
        }
        Ok(load_entries(&conn, evidence_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustodyConfig;
    use crate::custody::CustodyLedger;
    use crate::evidence::{EvidenceIngestor, IngestRequest};
    use crate::store::{ContentStore, FsBackend};
    use chrono::Duration;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn officer() -> Actor {
        Actor::new("officer-17", "Det. Rivera")
    }

    fn ingest(ingestor: &EvidenceIngestor, data: &[u8], case_ref: &str) -> EvidenceRecord {
        ingestor
            .ingest(IngestRequest::new(data.to_vec(), "upload.bin", "application/octet-stream", case_ref, officer()))
            .unwrap()
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let repo = EvidenceRepository::in_memory().unwrap();
        let ingestor = EvidenceIngestor::in_memory(CustodyConfig::default());
        let mut data = b"MZ".to_vec();
        data.extend_from_slice(b" payload http://cdn.example.top/a ");
        let record = ingest(&ingestor, &data, "CASE-1");

        repo.save_record(&record).unwrap();
        let loaded = repo.load_record(&record.evidence_id).unwrap().unwrap();
        assert_eq!(loaded, record);

        assert!(repo.load_record(&EvidenceId::new()).unwrap().is_none());
        // primary key
        assert!(repo.save_record(&record).is_err());
    }

    #[test]
    fn test_append_entry_rules() {
        let repo = EvidenceRepository::in_memory().unwrap();
        let ingestor = EvidenceIngestor::in_memory(CustodyConfig::default());
        let record = ingest(&ingestor, b"phone dump", "CASE-1");
        repo.save_record(&record).unwrap();

        let seq = ingestor
            .record_access(&record.evidence_id, CustodyAction::Viewed, &officer(), Some("review"))
            .unwrap();
        let log = ingestor.custody_log(&record.evidence_id).unwrap();
        repo.append_entry(&record.evidence_id, &log[seq as usize]).unwrap();

        // same sequence twice
        assert!(matches!(
            repo.append_entry(&record.evidence_id, &log[1]),
            Err(CustodyError::SequenceConflict { .. })
        ));

        let stale = CustodyEntry::new(
            2,
            CustodyAction::Viewed,
            &officer(),
            log[1].timestamp() - Duration::seconds(30),
            None,
        );
        assert!(matches!(
            repo.append_entry(&record.evidence_id, &stale),
            Err(CustodyError::OutOfOrder { .. })
        ));

        assert!(matches!(
            repo.append_entry(&EvidenceId::new(), &log[1]),
            Err(CustodyError::UnknownEvidence(_))
        ));
        assert_eq!(repo.custody_log(&record.evidence_id).unwrap(), log);
    }

    #[test]
    fn test_triggers_block_rewrites() {
        let repo = EvidenceRepository::in_memory().unwrap();
        let ingestor = EvidenceIngestor::in_memory(CustodyConfig::default());
        let record = ingest(&ingestor, b"bank statement scan", "CASE-1");
        repo.save_record(&record).unwrap();
        let id = record.evidence_id.to_string();

        let conn = repo.conn.lock();
        assert!(conn
            .execute("UPDATE custody_entries SET actor_id = 'someone-else' WHERE evidence_id = ?1", params![id])
            .is_err());
        assert!(conn
            .execute("DELETE FROM custody_entries WHERE evidence_id = ?1", params![id])
            .is_err());
        assert!(conn
            .execute("UPDATE evidence_records SET sha256 = 'x' WHERE evidence_id = ?1", params![id])
            .is_err());
        assert!(conn
            .execute("DELETE FROM evidence_records WHERE evidence_id = ?1", params![id])
            .is_err());
    }

    #[test]
    fn test_reprocess_and_supersede() {
        let repo = EvidenceRepository::in_memory().unwrap();
        let ingestor = EvidenceIngestor::in_memory(CustodyConfig::default());
        let original = ingest(&ingestor, b"original export", "CASE-7");
        repo.save_record(&original).unwrap();

        let outcome = ingestor.reprocess(&original, &officer(), None).unwrap();
        repo.save_record(&outcome.current).unwrap();
        let analyzed = outcome.superseded.custody_log.last().unwrap();
        repo.append_entry(&original.evidence_id, analyzed).unwrap();
        repo.mark_superseded(&original.evidence_id, &outcome.current.evidence_id)
            .unwrap();

        let loaded = repo.load_record(&original.evidence_id).unwrap().unwrap();
        assert_eq!(loaded.status, EvidenceStatus::Superseded);
        assert_eq!(loaded.custody_log, outcome.superseded.custody_log);
        assert_eq!(
            repo.superseded_by(&original.evidence_id).unwrap(),
            Some(outcome.current.evidence_id)
        );

        assert!(matches!(
            repo.mark_superseded(&original.evidence_id, &EvidenceId::new()),
            Err(CustodyError::InvalidInput(_))
        ));
        assert!(matches!(
            repo.mark_superseded(&EvidenceId::new(), &original.evidence_id),
            Err(CustodyError::UnknownEvidence(_))
        ));

        let case = repo.list_by_case("CASE-7").unwrap();
        assert_eq!(case.len(), 2);
        assert_eq!(case[1].supersedes, Some(original.evidence_id));
        assert!(repo.list_by_case("CASE-8").unwrap().is_empty());
    }

    #[test]
    fn test_restore_ledger_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db").join("evidence.db");
        let ingestor = EvidenceIngestor::in_memory(CustodyConfig::default());
        let record = ingest(&ingestor, b"usb image", "CASE-3");

        {
            let repo = EvidenceRepository::open(&path).unwrap();
            repo.save_record(&record).unwrap();
        }

        let repo = EvidenceRepository::open(&path).unwrap();
        let ledger = CustodyLedger::new();
        ledger
            .restore(record.evidence_id, repo.custody_log(&record.evidence_id).unwrap())
            .unwrap();
        assert_eq!(ledger.read(&record.evidence_id).unwrap(), record.custody_log);
        assert!(matches!(
            repo.custody_log(&EvidenceId::new()),
            Err(CustodyError::UnknownEvidence(_))
        ));
    }

    #[test]
    fn test_restart_rebuilds_store_index() {
        let dir = TempDir::new().unwrap();
        let blobs = dir.path().join("blobs");
        let repo = EvidenceRepository::open(&dir.path().join("evidence.db")).unwrap();

        let (kept, destroyed) = {
            let store = Arc::new(ContentStore::new(Arc::new(FsBackend::new(&blobs).unwrap())));
            let ingestor = EvidenceIngestor::new(CustodyConfig::default(), store, Arc::new(CustodyLedger::new()));
            let a = ingest(&ingestor, b"handset extraction", "CASE-4");
            let b = ingest(&ingestor, b"handset extraction", "CASE-5");
            let c = ingest(&ingestor, b"expired warrant copy", "CASE-4");
            for record in [&a, &b, &c] {
                repo.save_record(record).unwrap();
            }

            ingestor.destroy(&c, &officer(), Some("retention expired")).unwrap();
            let log = ingestor.custody_log(&c.evidence_id).unwrap();
            repo.append_entry(&c.evidence_id, log.last().unwrap()).unwrap();
            assert_eq!(ingestor.store().collect_garbage().unwrap(), vec![c.storage_key.clone()]);
            (a, c)
        };

        let references = repo.blob_references().unwrap();
        assert_eq!(references.len(), 2);

        let store = ContentStore::new(Arc::new(FsBackend::new(&blobs).unwrap()));
        for blob in &references {
            store.restore(blob).unwrap();
        }

        let restored = store.blob(&kept.storage_key).unwrap();
        assert_eq!(restored.ref_count, 2);
        assert_eq!(restored.byte_length, kept.size_bytes);
        assert_eq!(store.get(&kept.storage_key).unwrap(), b"handset extraction");
        assert!(store.blob(&destroyed.storage_key).is_none());

        assert_eq!(store.release(&kept.storage_key).unwrap(), 1);
    }
}
