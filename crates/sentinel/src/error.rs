use thiserror::Error;

/// Error type for the sentinel binary, aggregating errors from every crate
/// in the workspace.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("core error: {0}")]
    Core(#[from] sentinel_core::SentinelError),

    #[error("storage error: {0}")]
    Store(#[from] sentinel_store::StoreError),

    #[error("policy error: {0}")]
    Policy(#[from] sentinel_policy::PolicyError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] sentinel_checkpoint::CheckpointError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_error_config() {
        let err = RootError::Config("missing data_dir".into());
        assert_eq!(err.to_string(), "configuration error: missing data_dir");
    }

    #[test]
    fn test_root_error_from_store() {
        let err: RootError = sentinel_store::StoreError::Database("disk I/O error".into()).into();
        assert!(matches!(err, RootError::Store(_)));
        assert!(err.to_string().contains("disk I/O error"));
    }

    #[test]
    fn test_root_error_from_checkpoint() {
        let err: RootError = sentinel_checkpoint::CheckpointError::StationBusy(
            sentinel_core::StationId::new("gate-1"),
        )
        .into();
        assert!(err.to_string().contains("gate-1"));
    }

    #[test]
    fn test_root_error_from_policy() {
        let err: RootError = sentinel_policy::PolicyError::UnknownTier("BLUE".into()).into();
        assert!(err.to_string().contains("BLUE"));
    }

    #[test]
    fn test_root_error_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let root_err: RootError = toml_err.into();
        assert!(matches!(root_err, RootError::Config(_)));
    }

    #[test]
    fn test_root_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let root_err: RootError = json_err.into();
        assert!(matches!(root_err, RootError::Serialization(_)));
    }
}
