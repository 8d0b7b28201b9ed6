use crate::error::SentinelResult;
use crate::types::{
    ApprovalGrant, GrantDecision, IncidentRecord, InvitationRecord, OperatorId, Subject,
    SubjectId, Tier,
};

// ---------------------------------------------------------------------------
// InvitationRegistry — set of subjects holding a cross-zone invitation
//
// Written by hosts, read by the policy evaluator. Insertion is idempotent
// and commutative; no ordering is guaranteed between entries.
// ---------------------------------------------------------------------------

pub trait InvitationRegistry: Send + Sync {
    /// Idempotent insert. Returns the stored record (the original one if
    /// the subject was already invited).
    fn register(&self, subject_id: &SubjectId) -> SentinelResult<InvitationRecord>;
    fn is_invited(&self, subject_id: &SubjectId) -> SentinelResult<bool>;
    fn count(&self) -> SentinelResult<usize>;
    fn list(&self) -> SentinelResult<Vec<InvitationRecord>>;
}

// ---------------------------------------------------------------------------
// GrantStore — (subject, tier) -> most recent manual-review outcome
//
// Upserts to the same key are serialized; the last completed write is
// visible to every subsequent lookup.
// ---------------------------------------------------------------------------

pub trait GrantStore: Send + Sync {
    fn lookup(&self, subject_id: &SubjectId, tier: Tier) -> SentinelResult<Option<ApprovalGrant>>;
    fn upsert(
        &self,
        subject_id: &SubjectId,
        tier: Tier,
        decision: GrantDecision,
        operator: &OperatorId,
    ) -> SentinelResult<ApprovalGrant>;
    fn list(&self) -> SentinelResult<Vec<ApprovalGrant>>;
}

// ---------------------------------------------------------------------------
// IncidentLog — append-only, hash-chained record of refused attempts
// ---------------------------------------------------------------------------

pub trait IncidentLog: Send + Sync {
    fn record(
        &self,
        subject_ref: &SubjectId,
        tier_context: Tier,
        reason: &str,
    ) -> SentinelResult<IncidentRecord>;

    /// Newest-first, at most `limit` records.
    fn recent(&self, limit: usize) -> SentinelResult<Vec<IncidentRecord>>;
    fn count(&self) -> SentinelResult<usize>;

    /// Recompute every link of the chain from the first record.
    fn verify_chain(&self) -> SentinelResult<bool>;
}

// ---------------------------------------------------------------------------
// SubjectDirectory — external identity lookup (read-only to the engine)
// ---------------------------------------------------------------------------

pub trait SubjectDirectory: Send + Sync {
    /// Resolve by subject id, national id or staff code (case-insensitive).
    fn resolve(&self, identifier: &str) -> SentinelResult<Option<Subject>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the trait objects are object-safe
    fn _assert_invitations_object_safe(_: &dyn InvitationRegistry) {}
    fn _assert_grants_object_safe(_: &dyn GrantStore) {}
    fn _assert_incidents_object_safe(_: &dyn IncidentLog) {}
    fn _assert_directory_object_safe(_: &dyn SubjectDirectory) {}

    #[test]
    fn test_incident_record_serialization() {
        use crate::types::{IncidentHash, IncidentId, Timestamp};

        let record = IncidentRecord {
            id: IncidentId::new("INC-1"),
            timestamp: Timestamp::from_seconds(1_700_000_000),
            subject_ref: SubjectId::new("S2"),
            tier_context: Tier::Orange,
            reason: "no active invitation".into(),
            previous_hash: None,
            hash: IncidentHash([7; 32]),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: IncidentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.description(), "Scan at [ORANGE]. no active invitation.");
    }
}
