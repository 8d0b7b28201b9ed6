use std::sync::Arc;

use sentinel_core::{
    GrantStore, IncidentLog, InvitationRegistry, PolicyClass, Subject, Tier, Verdict,
};

use crate::catalog::TierCatalog;
use crate::error::{PolicyError, PolicyResult};

/// Verdict and incident reasons produced by the evaluator.
pub mod reasons {
    pub const OPEN_TIER: &str = "open tier";
    pub const INVITED_OR_STAFF: &str = "active invitation or staff";
    pub const NO_INVITATION: &str = "no active invitation";
    pub const PERSISTENT_CLEARANCE: &str = "persistent clearance";
    pub const MANUAL_CLEARANCE_REQUIRED: &str = "manual clearance required";
}

// ---------------------------------------------------------------------------
// PolicyEvaluator — Subject + Tier = Verdict
// ---------------------------------------------------------------------------

/// Access policy evaluator.
///
/// Combines the tier catalog, the invitation registry and the approval grant
/// store into a three-way verdict. The only side effect is the incident
/// written on an invitation-gated denial; grants are read, never written.
#[derive(Clone)]
pub struct PolicyEvaluator {
    catalog: TierCatalog,
    invitations: Arc<dyn InvitationRegistry>,
    grants: Arc<dyn GrantStore>,
    incidents: Arc<dyn IncidentLog>,
}

impl PolicyEvaluator {
    pub fn new(
        catalog: TierCatalog,
        invitations: Arc<dyn InvitationRegistry>,
        grants: Arc<dyn GrantStore>,
        incidents: Arc<dyn IncidentLog>,
    ) -> Self {
        Self {
            catalog,
            invitations,
            grants,
            incidents,
        }
    }

    pub fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    /// Core evaluation.
    ///
    /// Returns `Err` for an unknown tier, an empty subject id, or a store
    /// failure. A failed incident write on the denial path is an error, not
    /// a DENY: the caller must not observe a verdict whose audit record was
    /// lost.
    pub fn evaluate(&self, subject: &Subject, tier: Tier) -> PolicyResult<Verdict> {
        if subject.id.as_str().trim().is_empty() {
            return Err(PolicyError::InvalidRequest(
                "subject id must not be empty".to_string(),
            ));
        }

        let policy_class = self.catalog.classify(tier)?;
        tracing::debug!(
            subject = %subject.id,
            tier = %tier,
            policy_class = %policy_class,
            "evaluating access request"
        );

        let verdict = match policy_class {
            PolicyClass::Open => Verdict::allow(reasons::OPEN_TIER),
            PolicyClass::InvitationGated => self.evaluate_invitation_gated(subject, tier)?,
            PolicyClass::ApprovalGated => self.evaluate_approval_gated(subject, tier)?,
        };

        tracing::info!(
            subject = %subject.id,
            tier = %tier,
            verdict = %verdict,
            "access evaluated"
        );
        Ok(verdict)
    }

    fn evaluate_invitation_gated(&self, subject: &Subject, tier: Tier) -> PolicyResult<Verdict> {
        if subject.is_staff() || self.holds_invitation(subject)? {
            return Ok(Verdict::allow(reasons::INVITED_OR_STAFF));
        }

        let incident = self
            .incidents
            .record(&subject.id, tier, reasons::NO_INVITATION)
            .map_err(|e| {
                PolicyError::Persistence(format!("failed to record denial incident: {}", e))
            })?;
        tracing::warn!(
            subject = %subject.id,
            tier = %tier,
            incident = %incident.id,
            "denied: no active invitation"
        );
        Ok(Verdict::deny(reasons::NO_INVITATION))
    }

    fn evaluate_approval_gated(&self, subject: &Subject, tier: Tier) -> PolicyResult<Verdict> {
        match self.grants.lookup(&subject.id, tier)? {
            Some(grant) if grant.is_allowed() => {
                tracing::debug!(
                    subject = %subject.id,
                    tier = %tier,
                    sequence = grant.sequence,
                    "persistent clearance found"
                );
                Ok(Verdict::allow(reasons::PERSISTENT_CLEARANCE))
            }
            _ => Ok(Verdict::pending(reasons::MANUAL_CLEARANCE_REQUIRED)),
        }
    }

    fn holds_invitation(&self, subject: &Subject) -> PolicyResult<bool> {
        for key in subject.invitation_keys() {
            if self.invitations.is_invited(&key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
