//! Hash chain over the incident log.
//!
//! Each record commits to the hash of the record before it, so rewriting or
//! removing a persisted incident breaks every later link. Both backends build
//! records through [`seal`] and check them with [`verify`].

use sentinel_core::{IncidentHash, IncidentId, IncidentRecord, SubjectId, Tier, Timestamp};
use sha2::{Digest, Sha256};

/// Compute the hash of an incident including the previous link.
pub fn compute_hash(
    id: &IncidentId,
    timestamp: &Timestamp,
    subject_ref: &SubjectId,
    tier_context: Tier,
    reason: &str,
    previous: Option<&IncidentHash>,
) -> IncidentHash {
    let mut hasher = Sha256::new();

    if let Some(prev) = previous {
        hasher.update(prev.0);
    }

    hasher.update(timestamp.seconds_since_epoch.to_le_bytes());
    hasher.update(timestamp.nanoseconds.to_le_bytes());

    // Length-prefix the variable fields so "ab"+"c" and "a"+"bc" differ.
    for field in [id.as_str(), subject_ref.as_str(), tier_context.as_str(), reason] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }

    let hash = hasher.finalize();
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    IncidentHash(result)
}

/// Build a sealed record appended after `previous`.
pub fn seal(
    sequence: u64,
    timestamp: Timestamp,
    subject_ref: &SubjectId,
    tier_context: Tier,
    reason: &str,
    previous: Option<IncidentHash>,
) -> IncidentRecord {
    let id = incident_id(sequence);
    let hash = compute_hash(
        &id,
        &timestamp,
        subject_ref,
        tier_context,
        reason,
        previous.as_ref(),
    );
    IncidentRecord {
        id,
        timestamp,
        subject_ref: subject_ref.clone(),
        tier_context,
        reason: reason.to_string(),
        previous_hash: previous,
        hash,
    }
}

pub fn incident_id(sequence: u64) -> IncidentId {
    IncidentId::new(format!("INC-{}", sequence))
}

/// Verify records given in append order (oldest first).
pub fn verify(records: &[IncidentRecord]) -> bool {
    let mut previous: Option<&IncidentHash> = None;
    for record in records {
        if record.previous_hash.as_ref() != previous {
            return false;
        }
        let expected = compute_hash(
            &record.id,
            &record.timestamp,
            &record.subject_ref,
            record.tier_context,
            &record.reason,
            previous,
        );
        if expected != record.hash {
            return false;
        }
        previous = Some(&record.hash);
    }
    true
}
