use sentinel_checkpoint::DEFAULT_FAILURE_PROBABILITY;
use sentinel_core::Tier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RootError, RootResult};

/// Where the three persistent stores live.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Single SQLite file under `data_dir` (default).
    #[default]
    Sqlite,
    /// Process memory only; everything is lost on exit.
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Checkpoint station behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointConfig {
    /// Probability (0.0 to 1.0) that a scan is unreadable.
    #[serde(default = "default_failure_probability")]
    pub sensor_failure_probability: f64,

    /// Fixed seed for reproducible failure sequences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_seed: Option<u64>,
}

fn default_failure_probability() -> f64 {
    DEFAULT_FAILURE_PROBABILITY
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            sensor_failure_probability: default_failure_probability(),
            failure_seed: None,
        }
    }
}

/// Tiers recognised by this site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierConfig {
    #[serde(default = "default_enabled_tiers")]
    pub enabled: Vec<Tier>,
}

fn default_enabled_tiers() -> Vec<Tier> {
    Tier::ALL.to_vec()
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tiers(),
        }
    }
}

/// Top-level configuration for the sentinel binary.
///
/// Loaded from a TOML file (typically `~/.sentinel/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RootConfig {
    /// Directory holding the database and other state.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Database file name, relative to `data_dir`.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    #[serde(default)]
    pub tiers: TierConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_data_dir() -> PathBuf {
    dirs_or_default(".sentinel")
}

fn default_database_file() -> String {
    "sentinel.db".to_string()
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            checkpoint: CheckpointConfig::default(),
            tiers: TierConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    pub fn validate(&self) -> RootResult<()> {
        let p = self.checkpoint.sensor_failure_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(RootError::Config(format!(
                "sensor_failure_probability must be between 0.0 and 1.0, got {}",
                p
            )));
        }
        if self.tiers.enabled.is_empty() {
            return Err(RootError::Config(
                "tiers.enabled must list at least one tier".into(),
            ));
        }
        if self.database_file.trim().is_empty() {
            return Err(RootError::Config("database_file must not be empty".into()));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".sentinel/config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RootConfig::default();
        assert!(config.data_dir.to_str().unwrap().contains(".sentinel"));
        assert_eq!(config.database_file, "sentinel.db");
        assert!((config.checkpoint.sensor_failure_probability - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.checkpoint.failure_seed, None);
        assert_eq!(config.tiers.enabled, Tier::ALL.to_vec());
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
data_dir = "/tmp/test-sentinel"
database_file = "gate.db"

[checkpoint]
sensor_failure_probability = 0.25
failure_seed = 99

[tiers]
enabled = ["GREEN", "ORANGE"]

[storage]
backend = "memory"
"#;
        let config: RootConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/test-sentinel"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/test-sentinel/gate.db"));
        assert!((config.checkpoint.sensor_failure_probability - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.checkpoint.failure_seed, Some(99));
        assert_eq!(config.tiers.enabled, vec![Tier::Green, Tier::Orange]);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RootConfig = toml::from_str("data_dir = \"/tmp/x\"\n").unwrap();
        assert_eq!(config.database_file, "sentinel.db");
        assert_eq!(config.checkpoint, CheckpointConfig::default());
        assert_eq!(config.tiers.enabled.len(), 4);
    }

    #[test]
    fn test_unknown_tier_in_toml_rejected() {
        let result: Result<RootConfig, _> = toml::from_str("[tiers]\nenabled = [\"BLUE\"]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_probability_bounds() {
        let mut config = RootConfig::default();
        config.checkpoint.sensor_failure_probability = 1.5;
        assert!(config.validate().is_err());
        config.checkpoint.sensor_failure_probability = -0.1;
        assert!(config.validate().is_err());
        config.checkpoint.sensor_failure_probability = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_tiers() {
        let mut config = RootConfig::default();
        config.tiers.enabled.clear();
        assert!(matches!(config.validate(), Err(RootError::Config(_))));
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = RootConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.database_file, "sentinel.db");
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = RootConfig::default();
        config.checkpoint.failure_seed = Some(7);
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: RootConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = std::env::temp_dir().join("sentinel-test-config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let config = RootConfig {
            data_dir: PathBuf::from("/tmp/data-test"),
            database_file: "site.db".into(),
            checkpoint: CheckpointConfig {
                sensor_failure_probability: 0.0,
                failure_seed: Some(1),
            },
            tiers: TierConfig {
                enabled: vec![Tier::Green, Tier::Red1],
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
            },
        };

        config.save(&path).unwrap();
        let loaded = RootConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = std::env::temp_dir().join("sentinel-test-config-invalid");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[checkpoint]\nsensor_failure_probability = 2.0\n").unwrap();

        assert!(matches!(RootConfig::load(&path), Err(RootError::Config(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
