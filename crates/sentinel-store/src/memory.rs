use sentinel_core::{
    ApprovalGrant, GrantDecision, GrantStore, IncidentLog, IncidentRecord, InvitationRecord,
    InvitationRegistry, OperatorId, SentinelResult, SubjectId, Tier, Timestamp,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::chain;
use crate::error::StoreError;

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, StoreError> {
    mutex
        .lock()
        .map_err(|e| StoreError::LockPoisoned(format!("{}: {}", what, e)))
}

// ---------------------------------------------------------------------------
// InMemoryInvitationRegistry
// ---------------------------------------------------------------------------

/// In-memory invitation set. Useful for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryInvitationRegistry {
    entries: Mutex<HashMap<SubjectId, InvitationRecord>>,
}

impl InMemoryInvitationRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InvitationRegistry for InMemoryInvitationRegistry {
    fn register(&self, subject_id: &SubjectId) -> SentinelResult<InvitationRecord> {
        let mut entries = lock(&self.entries, "invitations")?;
        let record = entries
            .entry(subject_id.clone())
            .or_insert_with(|| InvitationRecord {
                subject_id: subject_id.clone(),
                registered_at: Timestamp::now(),
            })
            .clone();
        tracing::debug!(subject = %subject_id, "invitation registered");
        Ok(record)
    }

    fn is_invited(&self, subject_id: &SubjectId) -> SentinelResult<bool> {
        Ok(lock(&self.entries, "invitations")?.contains_key(subject_id))
    }

    fn count(&self) -> SentinelResult<usize> {
        Ok(lock(&self.entries, "invitations")?.len())
    }

    fn list(&self) -> SentinelResult<Vec<InvitationRecord>> {
        let mut records: Vec<InvitationRecord> =
            lock(&self.entries, "invitations")?.values().cloned().collect();
        records.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// InMemoryGrantStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GrantTable {
    grants: HashMap<(SubjectId, Tier), ApprovalGrant>,
    next_sequence: u64,
}

/// In-memory grant store. A single mutex serializes every upsert, so the
/// sequence counter and the table always move together.
#[derive(Default)]
pub struct InMemoryGrantStore {
    table: Mutex<GrantTable>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GrantStore for InMemoryGrantStore {
    fn lookup(&self, subject_id: &SubjectId, tier: Tier) -> SentinelResult<Option<ApprovalGrant>> {
        let table = lock(&self.table, "grants")?;
        Ok(table.grants.get(&(subject_id.clone(), tier)).cloned())
    }

    fn upsert(
        &self,
        subject_id: &SubjectId,
        tier: Tier,
        decision: GrantDecision,
        operator: &OperatorId,
    ) -> SentinelResult<ApprovalGrant> {
        let mut table = lock(&self.table, "grants")?;
        table.next_sequence += 1;
        let grant = ApprovalGrant {
            subject_id: subject_id.clone(),
            tier,
            decision,
            resolved_at: Timestamp::now(),
            resolved_by: operator.clone(),
            sequence: table.next_sequence,
        };
        table
            .grants
            .insert((subject_id.clone(), tier), grant.clone());
        tracing::debug!(
            subject = %subject_id,
            tier = %tier,
            decision = %decision,
            sequence = grant.sequence,
            "grant upserted"
        );
        Ok(grant)
    }

    fn list(&self) -> SentinelResult<Vec<ApprovalGrant>> {
        let table = lock(&self.table, "grants")?;
        let mut grants: Vec<ApprovalGrant> = table.grants.values().cloned().collect();
        grants.sort_by_key(|g| g.sequence);
        Ok(grants)
    }
}

// ---------------------------------------------------------------------------
// InMemoryIncidentLog
// ---------------------------------------------------------------------------

/// In-memory, hash-chained incident log. Storage order is append order.
#[derive(Default)]
pub struct InMemoryIncidentLog {
    records: Mutex<Vec<IncidentRecord>>,
}

impl InMemoryIncidentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in append order (for testing/inspection).
    pub fn all(&self) -> Vec<IncidentRecord> {
        lock(&self.records, "incidents")
            .map(|r| r.to_vec())
            .unwrap_or_default()
    }
}

impl IncidentLog for InMemoryIncidentLog {
    fn record(
        &self,
        subject_ref: &SubjectId,
        tier_context: Tier,
        reason: &str,
    ) -> SentinelResult<IncidentRecord> {
        let mut records = lock(&self.records, "incidents")?;
        let previous = records.last().map(|r| r.hash.clone());
        let record = chain::seal(
            records.len() as u64 + 1,
            Timestamp::now(),
            subject_ref,
            tier_context,
            reason,
            previous,
        );
        records.push(record.clone());
        Ok(record)
    }

    fn recent(&self, limit: usize) -> SentinelResult<Vec<IncidentRecord>> {
        let records = lock(&self.records, "incidents")?;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    fn count(&self) -> SentinelResult<usize> {
        Ok(lock(&self.records, "incidents")?.len())
    }

    fn verify_chain(&self) -> SentinelResult<bool> {
        let records = lock(&self.records, "incidents")?;
        Ok(chain::verify(&records))
    }
}
