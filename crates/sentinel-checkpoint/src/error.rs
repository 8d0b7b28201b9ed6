use sentinel_core::{SentinelError, StationId};
use sentinel_policy::PolicyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// A grant or incident write failed; the review stays pending.
    #[error("persistence unavailable: {0}")]
    Persistence(String),

    #[error("station {0} already has an unresolved session")]
    StationBusy(StationId),

    #[error("review not found: {0}")]
    ReviewNotFound(String),

    #[error("session cancelled before resolution")]
    SessionCancelled,

    #[error("unknown subject: {0}")]
    UnknownSubject(String),

    #[error("invalid session transition: {0}")]
    InvalidTransition(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SentinelError> for CheckpointError {
    fn from(e: SentinelError) -> Self {
        match e {
            SentinelError::UnknownSubject(s) => CheckpointError::UnknownSubject(s),
            SentinelError::UnknownTier(t) => CheckpointError::Policy(PolicyError::UnknownTier(t)),
            SentinelError::InvalidInput(msg) => {
                CheckpointError::Policy(PolicyError::InvalidRequest(msg))
            }
            other => CheckpointError::Persistence(other.to_string()),
        }
    }
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_busy_display() {
        let err = CheckpointError::StationBusy(StationId::new("gate-1"));
        assert_eq!(
            err.to_string(),
            "station gate-1 already has an unresolved session"
        );
    }

    #[test]
    fn test_from_policy_error() {
        let err: CheckpointError = PolicyError::UnknownTier("X".into()).into();
        assert!(matches!(err, CheckpointError::Policy(PolicyError::UnknownTier(_))));
    }

    #[test]
    fn test_from_sentinel_error() {
        let err: CheckpointError = SentinelError::PersistenceUnavailable("locked".into()).into();
        assert!(matches!(err, CheckpointError::Persistence(_)));

        let err: CheckpointError = SentinelError::UnknownSubject("X-1".into()).into();
        assert!(matches!(err, CheckpointError::UnknownSubject(_)));
    }
}
