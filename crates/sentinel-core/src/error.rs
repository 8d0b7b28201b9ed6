use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("unknown tier: {0}")]
    UnknownTier(String),

    #[error("unknown subject: {0}")]
    UnknownSubject(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A store could not complete a read or write. Never mapped to a verdict.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for SentinelError {
    fn from(e: serde_json::Error) -> Self {
        SentinelError::Serialization(e.to_string())
    }
}

pub type SentinelResult<T> = Result<T, SentinelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SentinelError::UnknownTier("PURPLE".into());
        assert_eq!(err.to_string(), "unknown tier: PURPLE");

        let err = SentinelError::PersistenceUnavailable("disk full".into());
        assert_eq!(err.to_string(), "persistence unavailable: disk full");
    }

    #[test]
    fn test_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: SentinelError = json_err.into();
        assert!(matches!(err, SentinelError::Serialization(_)));
    }
}
