use sentinel_core::SentinelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for SentinelError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Corrupt(msg) => SentinelError::Serialization(msg),
            other => SentinelError::PersistenceUnavailable(other.to_string()),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_maps_to_persistence_unavailable() {
        let err: SentinelError = StoreError::Database("disk I/O error".into()).into();
        assert!(matches!(err, SentinelError::PersistenceUnavailable(ref m) if m.contains("disk I/O")));
    }

    #[test]
    fn test_lock_error_maps_to_persistence_unavailable() {
        let err: SentinelError = StoreError::LockPoisoned("grants".into()).into();
        assert!(matches!(err, SentinelError::PersistenceUnavailable(_)));
    }

    #[test]
    fn test_corrupt_maps_to_serialization() {
        let err: SentinelError = StoreError::Corrupt("bad tier".into()).into();
        assert!(matches!(err, SentinelError::Serialization(_)));
    }
}
