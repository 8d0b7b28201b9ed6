use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use sentinel_core::{
    GrantDecision, GrantStore, IncidentLog, Modality, OperatorId, ReviewId, SessionId,
    StationId, SubjectDirectory, Timestamp, Verdict,
};
use sentinel_policy::PolicyEvaluator;

use crate::error::{CheckpointError, CheckpointResult};
use crate::failure::FailureSource;
use crate::review::{PendingReview, PendingScan, ReviewQueue};
use crate::session::{ScanRequest, ScanSession, SessionState};

/// Verdict and incident reasons produced at the checkpoint.
pub mod reasons {
    pub const SENSOR_FAILURE: &str = "sensor/record unrecognized";
    pub const CLEARANCE_GRANTED: &str = "clearance granted";
    pub const CLEARANCE_REFUSED: &str = "clearance refused";
    pub const OPERATOR_REJECTED: &str = "clearance rejected by operator";
}

/// Result of submitting a scan.
#[derive(Debug)]
pub enum ScanOutcome {
    /// The session reached a terminal state with a verdict.
    Completed(ScanSession),
    /// The session is waiting for an operator.
    Pending(PendingScan),
}

impl ScanOutcome {
    /// Verdict delivered so far: the final one, or `Pending` while awaiting review.
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            ScanOutcome::Completed(session) => session.verdict.clone(),
            ScanOutcome::Pending(_) => Some(Verdict::pending(
                sentinel_policy::reasons::MANUAL_CLEARANCE_REQUIRED,
            )),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ScanOutcome::Pending(_))
    }
}

// ---------------------------------------------------------------------------
// ScanOrchestrator — station sessions, sensor failure, manual review
// ---------------------------------------------------------------------------

/// Runs checkpoint sessions for every station.
///
/// Lock order is stations, then review queue. Approve and reject release
/// the queue before touching the station table.
pub struct ScanOrchestrator {
    evaluator: PolicyEvaluator,
    grants: Arc<dyn GrantStore>,
    incidents: Arc<dyn IncidentLog>,
    failure: Arc<dyn FailureSource>,
    directory: Option<Arc<dyn SubjectDirectory>>,
    stations: Mutex<HashMap<StationId, ScanSession>>,
    reviews: ReviewQueue,
    next_session: AtomicU64,
    next_review: AtomicU64,
}

impl ScanOrchestrator {
    pub fn new(
        evaluator: PolicyEvaluator,
        grants: Arc<dyn GrantStore>,
        incidents: Arc<dyn IncidentLog>,
        failure: Arc<dyn FailureSource>,
    ) -> Self {
        Self {
            evaluator,
            grants,
            incidents,
            failure,
            directory: None,
            stations: Mutex::new(HashMap::new()),
            reviews: ReviewQueue::new(),
            next_session: AtomicU64::new(0),
            next_review: AtomicU64::new(0),
        }
    }

    /// Attach the directory used by [`scan_identifier`](Self::scan_identifier).
    pub fn with_directory(mut self, directory: Arc<dyn SubjectDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    fn lock_stations(&self) -> CheckpointResult<MutexGuard<'_, HashMap<StationId, ScanSession>>> {
        self.stations
            .lock()
            .map_err(|e| CheckpointError::Internal(format!("station table lock poisoned: {}", e)))
    }

    fn next_session_id(&self) -> SessionId {
        let n = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        SessionId::new(format!("SES-{}", n))
    }

    fn next_review_id(&self) -> ReviewId {
        let n = self.next_review.fetch_add(1, Ordering::Relaxed) + 1;
        ReviewId::new(format!("REV-{}", n))
    }

    /// Submit a scan from a station.
    ///
    /// Returns immediately. Approval-gated requests without a grant come
    /// back as [`ScanOutcome::Pending`]; await the handle for the final
    /// verdict. Errors leave the station idle and produce no verdict.
    pub fn scan(&self, request: ScanRequest) -> CheckpointResult<ScanOutcome> {
        // Reject input outside the catalog before the station is touched.
        self.evaluator.catalog().classify(request.tier)?;

        let station = request.station_id.clone();
        let session_id = {
            let mut stations = self.lock_stations()?;
            if let Some(current) = stations.get(&station) {
                if current.state.is_active() {
                    tracing::warn!(
                        station = %station,
                        session = %current.session_id,
                        state = %current.state,
                        "scan rejected: station busy"
                    );
                    return Err(CheckpointError::StationBusy(station));
                }
            }
            let mut session = ScanSession::open(self.next_session_id(), &request);
            session.transition(SessionState::Scanning)?;
            let id = session.session_id.clone();
            // Replaces any terminal session left on the station.
            stations.insert(station.clone(), session);
            id
        };

        tracing::info!(
            station = %station,
            session = %session_id,
            subject = %request.subject.id,
            tier = %request.tier,
            modality = %request.modality,
            "scan started"
        );

        if self.failure.sensor_fails(&request) {
            return self.finish_sensor_failure(&request);
        }

        let verdict = match self.evaluator.evaluate(&request.subject, request.tier) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(
                    station = %station,
                    session = %session_id,
                    error = %e,
                    "evaluation failed, scan abandoned"
                );
                let mut stations = self.lock_stations()?;
                if let Some(mut session) = stations.remove(&station) {
                    session.transition(SessionState::Idle)?;
                }
                return Err(e.into());
            }
        };

        let mut stations = self.lock_stations()?;
        let session = stations.get_mut(&station).ok_or_else(|| {
            CheckpointError::Internal(format!("session {} vanished during scan", session_id))
        })?;
        session.transition(SessionState::Evaluated)?;

        match verdict {
            Verdict::Allow(_) => {
                session.finish(SessionState::Allow, verdict)?;
                Ok(ScanOutcome::Completed(session.clone()))
            }
            Verdict::Deny(_) => {
                session.finish(SessionState::Deny, verdict)?;
                Ok(ScanOutcome::Completed(session.clone()))
            }
            Verdict::Pending(_) => {
                session.transition(SessionState::AwaitingManualReview)?;
                let review_id = self.next_review_id();
                session.review_id = Some(review_id.clone());
                session.verdict = Some(verdict);
                let pending = self.reviews.enqueue(PendingReview {
                    review_id: review_id.clone(),
                    session_id: session.session_id.clone(),
                    station_id: station.clone(),
                    subject: request.subject.clone(),
                    tier: request.tier,
                    modality: request.modality,
                    enqueued_at: Timestamp::now(),
                })?;
                tracing::info!(
                    station = %station,
                    session = %session_id,
                    review = %review_id,
                    "awaiting manual review"
                );
                Ok(ScanOutcome::Pending(pending))
            }
        }
    }

    fn finish_sensor_failure(&self, request: &ScanRequest) -> CheckpointResult<ScanOutcome> {
        let mut stations = self.lock_stations()?;
        let session = stations.get_mut(&request.station_id).ok_or_else(|| {
            CheckpointError::Internal(format!(
                "station {} lost its session during scan",
                request.station_id
            ))
        })?;
        session.detail = Some(format!("Unrecognized {} record", request.modality));
        session.finish(
            SessionState::SystemFailure,
            Verdict::deny(reasons::SENSOR_FAILURE),
        )?;
        tracing::warn!(
            station = %request.station_id,
            session = %session.session_id,
            modality = %request.modality,
            "sensor failure, scan denied"
        );
        Ok(ScanOutcome::Completed(session.clone()))
    }

    /// Resolve the subject through the directory and parse the tier, then scan.
    pub fn scan_identifier(
        &self,
        station_id: StationId,
        identifier: &str,
        tier: &str,
        modality: Modality,
    ) -> CheckpointResult<ScanOutcome> {
        let directory = self.directory.as_ref().ok_or_else(|| {
            CheckpointError::InvalidConfig("no subject directory configured".to_string())
        })?;
        let subject = directory
            .resolve(identifier)?
            .ok_or_else(|| CheckpointError::UnknownSubject(identifier.to_string()))?;
        let tier = self.evaluator.catalog().parse_tier(tier)?;
        self.scan(ScanRequest {
            station_id,
            subject,
            tier,
            modality,
        })
    }

    // -----------------------------------------------------------------------
    // Manual review
    // -----------------------------------------------------------------------

    pub fn pending_reviews(&self) -> CheckpointResult<Vec<PendingReview>> {
        self.reviews.list()
    }

    /// Grant clearance: persist an ALLOWED grant, then release the station.
    pub fn approve(&self, review_id: &ReviewId, operator: &OperatorId) -> CheckpointResult<Verdict> {
        let (review, verdict) = self.reviews.resolve_with(review_id, |review| {
            let grant = self
                .grants
                .upsert(&review.subject.id, review.tier, GrantDecision::Allowed, operator)
                .map_err(|e| {
                    CheckpointError::Persistence(format!("failed to persist clearance: {}", e))
                })?;
            tracing::info!(
                review = %review.review_id,
                subject = %review.subject.id,
                tier = %review.tier,
                operator = %operator,
                sequence = grant.sequence,
                "clearance granted"
            );
            Ok(Verdict::allow(reasons::CLEARANCE_GRANTED))
        })?;
        self.settle(&review, SessionState::ResolvedAllow, verdict.clone())?;
        Ok(verdict)
    }

    /// Refuse clearance: record an incident, then release the station.
    /// No grant is written.
    pub fn reject(&self, review_id: &ReviewId, operator: &OperatorId) -> CheckpointResult<Verdict> {
        let (review, verdict) = self.reviews.resolve_with(review_id, |review| {
            let incident = self
                .incidents
                .record(&review.subject.id, review.tier, reasons::OPERATOR_REJECTED)
                .map_err(|e| {
                    CheckpointError::Persistence(format!("failed to record rejection: {}", e))
                })?;
            tracing::warn!(
                review = %review.review_id,
                subject = %review.subject.id,
                tier = %review.tier,
                operator = %operator,
                incident = %incident.id,
                "clearance refused"
            );
            Ok(Verdict::deny(reasons::CLEARANCE_REFUSED))
        })?;
        self.settle(&review, SessionState::ResolvedDeny, verdict.clone())?;
        Ok(verdict)
    }

    fn settle(
        &self,
        review: &PendingReview,
        next: SessionState,
        verdict: Verdict,
    ) -> CheckpointResult<()> {
        let mut stations = self.lock_stations()?;
        match stations.get_mut(&review.station_id) {
            Some(session) if session.session_id == review.session_id => {
                session.finish(next, verdict)
            }
            _ => {
                // Station was cancelled between resolution and now.
                tracing::debug!(
                    review = %review.review_id,
                    station = %review.station_id,
                    "resolved review has no live session"
                );
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stations
    // -----------------------------------------------------------------------

    /// Current session on a station, if any.
    pub fn session(&self, station_id: &StationId) -> CheckpointResult<Option<ScanSession>> {
        Ok(self.lock_stations()?.get(station_id).cloned())
    }

    /// Discard a session awaiting review. Writes no grant and no incident;
    /// the waiting handle resolves to `SessionCancelled`.
    pub fn cancel(&self, station_id: &StationId) -> CheckpointResult<ScanSession> {
        let mut stations = self.lock_stations()?;
        let state = stations
            .get(station_id)
            .map(|s| s.state)
            .ok_or_else(|| {
                CheckpointError::InvalidTransition(format!("station {} has no session", station_id))
            })?;
        if state != SessionState::AwaitingManualReview {
            return Err(CheckpointError::InvalidTransition(format!(
                "station {}: cannot cancel a session in {}",
                station_id, state
            )));
        }
        let review_id = stations
            .get(station_id)
            .and_then(|s| s.review_id.clone())
            .ok_or_else(|| {
                CheckpointError::Internal(format!("station {} has no review attached", station_id))
            })?;
        // An operator may have resolved the review already; the station then
        // belongs to that resolution, not to this cancel.
        if self.reviews.remove(&review_id)?.is_none() {
            return Err(CheckpointError::ReviewNotFound(review_id.to_string()));
        }
        let mut session = stations.remove(station_id).ok_or_else(|| {
            CheckpointError::Internal(format!("station {} lost its session", station_id))
        })?;
        session.transition(SessionState::Idle)?;
        tracing::warn!(
            station = %station_id,
            session = %session.session_id,
            "pending session cancelled"
        );
        Ok(session)
    }

    /// Return a station to idle after its verdict was delivered.
    ///
    /// Only terminal sessions close; a pending review leaves through
    /// [`cancel`](Self::cancel) or a resolution.
    pub fn close(&self, station_id: &StationId) -> CheckpointResult<()> {
        let mut stations = self.lock_stations()?;
        let Some(session) = stations.get_mut(station_id) else {
            return Ok(());
        };
        if !session.state.is_terminal() {
            return Err(CheckpointError::InvalidTransition(format!(
                "station {}: cannot close a session in {}",
                station_id, session.state
            )));
        }
        session.transition(SessionState::Idle)?;
        stations.remove(station_id);
        Ok(())
    }
}
