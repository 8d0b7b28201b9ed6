use sentinel_core::{Modality, ReviewId, SessionId, StationId, Subject, Tier, Timestamp, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CheckpointError, CheckpointResult};

/// A scan submitted by a checkpoint station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub station_id: StationId,
    pub subject: Subject,
    pub tier: Tier,
    pub modality: Modality,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Per-session state machine.
///
/// ```text
/// Idle -> Scanning -> SystemFailure
///                  -> Evaluated -> Allow | Deny | AwaitingManualReview
/// AwaitingManualReview -> ResolvedAllow | ResolvedDeny
/// terminal -> Idle (close); AwaitingManualReview -> Idle (cancel)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Scanning,
    SystemFailure,
    Evaluated,
    Allow,
    Deny,
    AwaitingManualReview,
    ResolvedAllow,
    ResolvedDeny,
}

impl SessionState {
    /// A verdict has been delivered; the station may start another scan.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::SystemFailure
                | SessionState::Allow
                | SessionState::Deny
                | SessionState::ResolvedAllow
                | SessionState::ResolvedDeny
        )
    }

    /// The station is occupied by this session.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Scanning | SessionState::Evaluated | SessionState::AwaitingManualReview
        )
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Scanning) => true,
            (Scanning, SystemFailure) | (Scanning, Evaluated) => true,
            // Evaluation error: the scan is abandoned without a verdict.
            (Scanning, Idle) => true,
            (Evaluated, Allow) | (Evaluated, Deny) | (Evaluated, AwaitingManualReview) => true,
            (AwaitingManualReview, ResolvedAllow) | (AwaitingManualReview, ResolvedDeny) => true,
            (AwaitingManualReview, Idle) => true,
            (from, Idle) => from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "IDLE",
            SessionState::Scanning => "SCANNING",
            SessionState::SystemFailure => "SYSTEM_FAILURE",
            SessionState::Evaluated => "EVALUATED",
            SessionState::Allow => "ALLOW",
            SessionState::Deny => "DENY",
            SessionState::AwaitingManualReview => "AWAITING_MANUAL_REVIEW",
            SessionState::ResolvedAllow => "RESOLVED_ALLOW",
            SessionState::ResolvedDeny => "RESOLVED_DENY",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ScanSession
// ---------------------------------------------------------------------------

/// One checkpoint interaction, from scan to delivered verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSession {
    pub session_id: SessionId,
    pub station_id: StationId,
    pub subject: Subject,
    pub requested_tier: Tier,
    pub modality: Modality,
    pub state: SessionState,
    pub opened_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<ReviewId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    /// Free-text note for the operator screen, e.g. the unreadable modality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ScanSession {
    pub fn open(session_id: SessionId, request: &ScanRequest) -> Self {
        Self {
            session_id,
            station_id: request.station_id.clone(),
            subject: request.subject.clone(),
            requested_tier: request.tier,
            modality: request.modality,
            state: SessionState::Idle,
            opened_at: Timestamp::now(),
            review_id: None,
            verdict: None,
            detail: None,
        }
    }

    pub fn transition(&mut self, next: SessionState) -> CheckpointResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(CheckpointError::InvalidTransition(format!(
                "session {}: {} -> {}",
                self.session_id, self.state, next
            )));
        }
        tracing::debug!(
            session = %self.session_id,
            station = %self.station_id,
            from = %self.state,
            to = %next,
            "session transition"
        );
        self.state = next;
        Ok(())
    }

    /// Move to a terminal state and attach the verdict that ended the session.
    pub fn finish(&mut self, next: SessionState, verdict: Verdict) -> CheckpointResult<()> {
        if !next.is_terminal() {
            return Err(CheckpointError::InvalidTransition(format!(
                "session {}: {} is not terminal",
                self.session_id, next
            )));
        }
        self.transition(next)?;
        self.verdict = Some(verdict);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ScanRequest {
        ScanRequest {
            station_id: StationId::new("gate-1"),
            subject: Subject::guest("S3", "Contractor"),
            tier: Tier::Red1,
            modality: Modality::Face,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut s = ScanSession::open(SessionId::new("SES-1"), &request());
        assert_eq!(s.state, SessionState::Idle);
        s.transition(SessionState::Scanning).unwrap();
        s.transition(SessionState::Evaluated).unwrap();
        s.transition(SessionState::AwaitingManualReview).unwrap();
        s.finish(SessionState::ResolvedAllow, Verdict::allow("clearance granted"))
            .unwrap();
        assert!(s.state.is_terminal());
        assert_eq!(s.verdict, Some(Verdict::allow("clearance granted")));
        s.transition(SessionState::Idle).unwrap();
    }

    #[test]
    fn test_sensor_failure_skips_evaluation() {
        let mut s = ScanSession::open(SessionId::new("SES-2"), &request());
        s.transition(SessionState::Scanning).unwrap();
        s.finish(SessionState::SystemFailure, Verdict::deny("x")).unwrap();
        assert!(s.transition(SessionState::Evaluated).is_err());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        use SessionState::*;
        assert!(!Idle.can_transition_to(Evaluated));
        assert!(!Scanning.can_transition_to(Allow));
        assert!(!Evaluated.can_transition_to(ResolvedAllow));
        assert!(!Allow.can_transition_to(Deny));
        assert!(!ResolvedDeny.can_transition_to(AwaitingManualReview));
        assert!(!Evaluated.can_transition_to(Idle));
    }

    #[test]
    fn test_every_terminal_state_closes_to_idle() {
        use SessionState::*;
        for state in [SystemFailure, Allow, Deny, ResolvedAllow, ResolvedDeny] {
            assert!(state.is_terminal());
            assert!(state.can_transition_to(Idle), "{} -> IDLE", state);
        }
    }

    #[test]
    fn test_finish_requires_terminal_state() {
        let mut s = ScanSession::open(SessionId::new("SES-3"), &request());
        s.transition(SessionState::Scanning).unwrap();
        s.transition(SessionState::Evaluated).unwrap();
        let err = s
            .finish(SessionState::AwaitingManualReview, Verdict::pending("x"))
            .unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidTransition(_)));
    }

    #[test]
    fn test_active_states() {
        assert!(SessionState::AwaitingManualReview.is_active());
        assert!(SessionState::Scanning.is_active());
        assert!(!SessionState::Idle.is_active());
        assert!(!SessionState::Deny.is_active());
    }

    #[test]
    fn test_state_serde_names() {
        let json = serde_json::to_string(&SessionState::AwaitingManualReview).unwrap();
        assert_eq!(json, "\"AWAITING_MANUAL_REVIEW\"");
        assert_eq!(
            SessionState::AwaitingManualReview.to_string(),
            "AWAITING_MANUAL_REVIEW"
        );
    }
}
