use rusqlite::{params, Connection, OptionalExtension};
use sentinel_core::{
    ApprovalGrant, GrantDecision, GrantStore, IncidentHash, IncidentId, IncidentLog,
    IncidentRecord, InvitationRecord, InvitationRegistry, OperatorId, SentinelResult, SubjectId,
    Tier, Timestamp,
};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::chain;
use crate::error::{StoreError, StoreResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS invitations (
    subject_id TEXT PRIMARY KEY NOT NULL,
    registered_secs INTEGER NOT NULL,
    registered_nanos INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS grants (
    subject_id TEXT NOT NULL,
    tier TEXT NOT NULL,
    decision TEXT NOT NULL,
    resolved_secs INTEGER NOT NULL,
    resolved_nanos INTEGER NOT NULL,
    resolved_by TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    PRIMARY KEY (subject_id, tier)
);
CREATE TABLE IF NOT EXISTS grant_sequence (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    value INTEGER NOT NULL
);
INSERT OR IGNORE INTO grant_sequence (id, value) VALUES (1, 0);
CREATE TABLE IF NOT EXISTS incidents (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    incident_id TEXT NOT NULL UNIQUE,
    created_secs INTEGER NOT NULL,
    created_nanos INTEGER NOT NULL,
    subject_ref TEXT NOT NULL,
    tier TEXT NOT NULL,
    reason TEXT NOT NULL,
    previous_hash TEXT,
    hash TEXT NOT NULL
);
";

/// SQLite backend holding all three durable stores in one database file.
///
/// One connection behind one mutex: every write is serialized, which covers
/// the grant store's last-write-wins requirement without per-key locks.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            StoreError::Database(format!("failed to open database: {}", e))
        })?;
        Self::with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::Database(format!("failed to create tables: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(format!("sqlite connection: {}", e)))
    }

    fn incidents_in_append_order(conn: &Connection) -> StoreResult<Vec<IncidentRecord>> {
        let mut stmt = conn.prepare(
            "SELECT incident_id, created_secs, created_nanos, subject_ref, tier, reason,
                    previous_hash, hash
             FROM incidents ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([], incident_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(decode_incident(row?)?);
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

type IncidentRow = (String, i64, i64, String, String, String, Option<String>, String);

fn incident_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IncidentRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn decode_incident(row: IncidentRow) -> StoreResult<IncidentRecord> {
    let (id, secs, nanos, subject_ref, tier, reason, previous_hash, hash) = row;
    let previous_hash = previous_hash
        .map(|h| parse_hash(&h))
        .transpose()?;
    Ok(IncidentRecord {
        id: IncidentId::new(id),
        timestamp: timestamp(secs, nanos),
        subject_ref: SubjectId::new(subject_ref),
        tier_context: parse_tier(&tier)?,
        reason,
        previous_hash,
        hash: parse_hash(&hash)?,
    })
}

type GrantRow = (String, String, String, i64, i64, String, i64);

fn grant_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GrantRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn decode_grant(row: GrantRow) -> StoreResult<ApprovalGrant> {
    let (subject_id, tier, decision, secs, nanos, resolved_by, sequence) = row;
    Ok(ApprovalGrant {
        subject_id: SubjectId::new(subject_id),
        tier: parse_tier(&tier)?,
        decision: decision
            .parse::<GrantDecision>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        resolved_at: timestamp(secs, nanos),
        resolved_by: OperatorId::new(resolved_by),
        sequence: sequence as u64,
    })
}

fn parse_tier(raw: &str) -> StoreResult<Tier> {
    raw.parse::<Tier>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn parse_hash(raw: &str) -> StoreResult<IncidentHash> {
    raw.parse::<IncidentHash>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn timestamp(secs: i64, nanos: i64) -> Timestamp {
    Timestamp {
        seconds_since_epoch: secs as u64,
        nanoseconds: nanos as u32,
    }
}

// ---------------------------------------------------------------------------
// Store trait implementations
// ---------------------------------------------------------------------------

impl InvitationRegistry for SqliteStore {
    fn register(&self, subject_id: &SubjectId) -> SentinelResult<InvitationRecord> {
        let conn = self.conn()?;
        let now = Timestamp::now();
        conn.execute(
            "INSERT OR IGNORE INTO invitations (subject_id, registered_secs, registered_nanos)
             VALUES (?1, ?2, ?3)",
            params![
                subject_id.as_str(),
                now.seconds_since_epoch as i64,
                now.nanoseconds as i64
            ],
        )
        .map_err(|e| StoreError::Database(format!("invitation insert failed: {}", e)))?;

        let (secs, nanos): (i64, i64) = conn
            .query_row(
                "SELECT registered_secs, registered_nanos FROM invitations WHERE subject_id = ?1",
                params![subject_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(StoreError::from)?;

        tracing::debug!(subject = %subject_id, "invitation registered");
        Ok(InvitationRecord {
            subject_id: subject_id.clone(),
            registered_at: timestamp(secs, nanos),
        })
    }

    fn is_invited(&self, subject_id: &SubjectId) -> SentinelResult<bool> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM invitations WHERE subject_id = ?1",
                params![subject_id.as_str()],
                |row| row.get(0),
            )
            .map_err(StoreError::from)?;
        Ok(count > 0)
    }

    fn count(&self) -> SentinelResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM invitations", [], |row| row.get(0))
            .map_err(StoreError::from)?;
        Ok(count as usize)
    }

    fn list(&self) -> SentinelResult<Vec<InvitationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT subject_id, registered_secs, registered_nanos
                 FROM invitations ORDER BY subject_id ASC",
            )
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(InvitationRecord {
                    subject_id: SubjectId::new(row.get::<_, String>(0)?),
                    registered_at: timestamp(row.get(1)?, row.get(2)?),
                })
            })
            .map_err(StoreError::from)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(StoreError::from)?);
        }
        Ok(records)
    }
}

impl GrantStore for SqliteStore {
    fn lookup(&self, subject_id: &SubjectId, tier: Tier) -> SentinelResult<Option<ApprovalGrant>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT subject_id, tier, decision, resolved_secs, resolved_nanos, resolved_by,
                        sequence
                 FROM grants WHERE subject_id = ?1 AND tier = ?2",
                params![subject_id.as_str(), tier.as_str()],
                grant_row,
            )
            .optional()
            .map_err(StoreError::from)?;
        Ok(row.map(decode_grant).transpose()?)
    }

    fn upsert(
        &self,
        subject_id: &SubjectId,
        tier: Tier,
        decision: GrantDecision,
        operator: &OperatorId,
    ) -> SentinelResult<ApprovalGrant> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(StoreError::from)?;

        tx.execute("UPDATE grant_sequence SET value = value + 1 WHERE id = 1", [])
            .map_err(|e| StoreError::Database(format!("grant sequence failed: {}", e)))?;
        let sequence: i64 = tx
            .query_row("SELECT value FROM grant_sequence WHERE id = 1", [], |row| {
                row.get(0)
            })
            .map_err(StoreError::from)?;

        let resolved_at = Timestamp::now();
        tx.execute(
            "INSERT OR REPLACE INTO grants
                (subject_id, tier, decision, resolved_secs, resolved_nanos, resolved_by, sequence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                subject_id.as_str(),
                tier.as_str(),
                decision.to_string(),
                resolved_at.seconds_since_epoch as i64,
                resolved_at.nanoseconds as i64,
                operator.as_str(),
                sequence
            ],
        )
        .map_err(|e| StoreError::Database(format!("grant upsert failed: {}", e)))?;
        tx.commit().map_err(StoreError::from)?;

        tracing::debug!(
            subject = %subject_id,
            tier = %tier,
            decision = %decision,
            sequence,
            "grant upserted"
        );
        Ok(ApprovalGrant {
            subject_id: subject_id.clone(),
            tier,
            decision,
            resolved_at,
            resolved_by: operator.clone(),
            sequence: sequence as u64,
        })
    }

    fn list(&self) -> SentinelResult<Vec<ApprovalGrant>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT subject_id, tier, decision, resolved_secs, resolved_nanos, resolved_by,
                        sequence
                 FROM grants ORDER BY sequence ASC",
            )
            .map_err(StoreError::from)?;
        let rows = stmt.query_map([], grant_row).map_err(StoreError::from)?;
        let mut grants = Vec::new();
        for row in rows {
            grants.push(decode_grant(row.map_err(StoreError::from)?)?);
        }
        Ok(grants)
    }
}

impl IncidentLog for SqliteStore {
    fn record(
        &self,
        subject_ref: &SubjectId,
        tier_context: Tier,
        reason: &str,
    ) -> SentinelResult<IncidentRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(StoreError::from)?;

        let last: Option<(i64, String)> = tx
            .query_row(
                "SELECT seq, hash FROM incidents ORDER BY seq DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(StoreError::from)?;

        let (next_seq, previous) = match last {
            Some((seq, hash)) => (seq as u64 + 1, Some(parse_hash(&hash)?)),
            None => (1, None),
        };

        let record = chain::seal(
            next_seq,
            Timestamp::now(),
            subject_ref,
            tier_context,
            reason,
            previous,
        );

        tx.execute(
            "INSERT INTO incidents
                (seq, incident_id, created_secs, created_nanos, subject_ref, tier, reason,
                 previous_hash, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                next_seq as i64,
                record.id.as_str(),
                record.timestamp.seconds_since_epoch as i64,
                record.timestamp.nanoseconds as i64,
                record.subject_ref.as_str(),
                record.tier_context.as_str(),
                record.reason,
                record.previous_hash.as_ref().map(|h| h.to_string()),
                record.hash.to_string()
            ],
        )
        .map_err(|e| StoreError::Database(format!("incident insert failed: {}", e)))?;
        tx.commit().map_err(StoreError::from)?;

        Ok(record)
    }

    fn recent(&self, limit: usize) -> SentinelResult<Vec<IncidentRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT incident_id, created_secs, created_nanos, subject_ref, tier, reason,
                        previous_hash, hash
                 FROM incidents ORDER BY seq DESC LIMIT ?1",
            )
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map(params![limit as i64], incident_row)
            .map_err(StoreError::from)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(decode_incident(row.map_err(StoreError::from)?)?);
        }
        Ok(records)
    }

    fn count(&self) -> SentinelResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))
            .map_err(StoreError::from)?;
        Ok(count as usize)
    }

    fn verify_chain(&self) -> SentinelResult<bool> {
        let conn = self.conn()?;
        let records = Self::incidents_in_append_order(&conn)?;
        Ok(chain::verify(&records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn test_store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    fn temp_db_path() -> std::path::PathBuf {
        let id = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "sentinel-store-{}-{}.db",
            std::process::id(),
            id
        ))
    }

    #[test]
    fn test_register_idempotent() {
        let store = test_store();
        let id = SubjectId::new("950505-10-1234");
        let first = store.register(&id).unwrap();
        let second = store.register(&id).unwrap();
        assert_eq!(first, second);
        assert!(store.is_invited(&id).unwrap());
        assert_eq!(InvitationRegistry::count(&store).unwrap(), 1);
        assert_eq!(InvitationRegistry::list(&store).unwrap().len(), 1);
    }

    #[test]
    fn test_grant_roundtrip_and_overwrite() {
        let store = test_store();
        let id = SubjectId::new("S3");
        assert!(store.lookup(&id, Tier::Red1).unwrap().is_none());

        let allowed = store
            .upsert(&id, Tier::Red1, GrantDecision::Allowed, &OperatorId::new("op"))
            .unwrap();
        assert_eq!(store.lookup(&id, Tier::Red1).unwrap().unwrap(), allowed);

        let denied = store
            .upsert(&id, Tier::Red1, GrantDecision::Denied, &OperatorId::new("op2"))
            .unwrap();
        assert!(denied.sequence > allowed.sequence);
        let live = store.lookup(&id, Tier::Red1).unwrap().unwrap();
        assert_eq!(live.decision, GrantDecision::Denied);
        assert_eq!(live.resolved_by.as_str(), "op2");
        assert_eq!(GrantStore::list(&store).unwrap().len(), 1);
    }

    #[test]
    fn test_incident_append_and_recent() {
        let store = test_store();
        store
            .record(&SubjectId::new("S2"), Tier::Orange, "no active invitation")
            .unwrap();
        let second = store
            .record(
                &SubjectId::new("S4"),
                Tier::Red2,
                "clearance rejected by operator",
            )
            .unwrap();
        assert_eq!(second.id.as_str(), "INC-2");

        let recent = store.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0], second);
        assert_eq!(IncidentLog::count(&store).unwrap(), 2);
        assert!(store.verify_chain().unwrap());
    }

    #[test]
    fn test_tampered_incident_detected() {
        let store = test_store();
        for i in 0..3 {
            store
                .record(&SubjectId::new(format!("S{}", i)), Tier::Orange, "x")
                .unwrap();
        }
        {
            let conn = store.conn().unwrap();
            conn.execute("UPDATE incidents SET reason = 'edited' WHERE seq = 2", [])
                .unwrap();
        }
        assert!(!store.verify_chain().unwrap());
    }

    #[test]
    fn test_state_survives_reopen() {
        let path = temp_db_path();
        {
            let store = SqliteStore::open(&path).unwrap();
            store.register(&SubjectId::new("G-1")).unwrap();
            store
                .upsert(
                    &SubjectId::new("S3"),
                    Tier::Red1,
                    GrantDecision::Allowed,
                    &OperatorId::new("op"),
                )
                .unwrap();
            store
                .record(&SubjectId::new("S2"), Tier::Orange, "no active invitation")
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.is_invited(&SubjectId::new("G-1")).unwrap());
        assert!(reopened
            .lookup(&SubjectId::new("S3"), Tier::Red1)
            .unwrap()
            .unwrap()
            .is_allowed());
        assert_eq!(IncidentLog::count(&reopened).unwrap(), 1);

        // Sequence keeps increasing across restarts.
        let next = reopened
            .upsert(
                &SubjectId::new("S5"),
                Tier::Red2,
                GrantDecision::Allowed,
                &OperatorId::new("op"),
            )
            .unwrap();
        assert_eq!(next.sequence, 2);

        drop(reopened);
        let _ = std::fs::remove_file(&path);
    }
}
