use sentinel_core::SentinelError;
use thiserror::Error;

/// Single error enum for all policy operations.
///
/// Sensor failures and policy denials are verdicts, not errors.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The tier is outside the configured catalog. Fatal to the request.
    #[error("unknown tier: {0}")]
    UnknownTier(String),

    /// A store read or the incident write failed; no verdict was produced.
    #[error("persistence unavailable: {0}")]
    Persistence(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<SentinelError> for PolicyError {
    fn from(e: SentinelError) -> Self {
        match e {
            SentinelError::UnknownTier(t) => PolicyError::UnknownTier(t),
            SentinelError::InvalidInput(msg) | SentinelError::UnknownSubject(msg) => {
                PolicyError::InvalidRequest(msg)
            }
            other => PolicyError::Persistence(other.to_string()),
        }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_error_display() {
        assert_eq!(
            PolicyError::UnknownTier("PURPLE".into()).to_string(),
            "unknown tier: PURPLE"
        );
        assert_eq!(
            PolicyError::Persistence("db locked".into()).to_string(),
            "persistence unavailable: db locked"
        );
    }

    #[test]
    fn test_from_sentinel_error() {
        let e: PolicyError = SentinelError::UnknownTier("X".into()).into();
        assert!(matches!(e, PolicyError::UnknownTier(_)));

        let e: PolicyError = SentinelError::PersistenceUnavailable("gone".into()).into();
        assert!(matches!(e, PolicyError::Persistence(ref m) if m.contains("gone")));

        let e: PolicyError = SentinelError::InvalidInput("empty".into()).into();
        assert!(matches!(e, PolicyError::InvalidRequest(_)));
    }
}
