//! Sentinel Checkpoint
//!
//! Drives one checkpoint interaction end-to-end: a station submits a scan,
//! the sensor may fail, the policy evaluator decides, and approval-gated
//! requests without a grant wait in the manual review queue until an
//! operator approves or rejects them.
//!
//! # Suspension
//!
//! The only suspension point is `AwaitingManualReview`. The scan call
//! returns immediately with a [`PendingScan`] handle; awaiting it completes
//! when an operator resolves the review or the station cancels it. No
//! thread blocks while a review is outstanding, and one station's pending
//! review never holds up another station.

pub mod error;
pub mod failure;
pub mod orchestrator;
pub mod review;
pub mod session;

pub use error::{CheckpointError, CheckpointResult};
pub use failure::{
    AlwaysFail, FailureSource, NeverFail, RandomFailure, DEFAULT_FAILURE_PROBABILITY,
};
pub use orchestrator::{reasons, ScanOrchestrator, ScanOutcome};
pub use review::{PendingReview, PendingScan, ReviewQueue};
pub use session::{ScanRequest, ScanSession, SessionState};
