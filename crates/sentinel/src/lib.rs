//! Sentinel Root Library
//!
//! Wires configuration, the persistent stores, the policy evaluator and the
//! checkpoint orchestrator into a single [`RootState`] used by the
//! `sentinel` binary and by integration tests.
//!
//! # Architecture
//!
//! The root crate is a thin assembler. `initialize_root` opens the
//! configured storage backend, builds the tier catalog from the enabled
//! tiers, picks the sensor failure source, and hands every component its
//! stores as trait objects. Nothing here holds global state; two
//! `RootState`s over the same data directory share data only through the
//! database file.

pub mod config;
pub mod error;

pub use config::{CheckpointConfig, RootConfig, StorageBackend, StorageConfig, TierConfig};
pub use error::{RootError, RootResult};

use sentinel_checkpoint::{
    FailureSource, PendingReview, RandomFailure, ScanOrchestrator, ScanOutcome,
};
use sentinel_core::{
    ApprovalGrant, GrantStore, IncidentLog, IncidentRecord, InvitationRecord, InvitationRegistry,
    Modality, OperatorId, ReviewId, SentinelError, StationId, SubjectDirectory, SubjectId,
    Verdict,
};
use sentinel_policy::{PolicyEvaluator, TierCatalog};
use sentinel_store::{
    InMemoryDirectory, InMemoryGrantStore, InMemoryIncidentLog, InMemoryInvitationRegistry,
    SqliteStore,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

// ---------------------------------------------------------------------------
// Root state
// ---------------------------------------------------------------------------

/// Runtime state for one sentinel process.
pub struct RootState {
    pub config: RootConfig,
    pub invitations: Arc<dyn InvitationRegistry>,
    pub grants: Arc<dyn GrantStore>,
    pub incidents: Arc<dyn IncidentLog>,
    pub directory: Arc<InMemoryDirectory>,
    pub orchestrator: Arc<ScanOrchestrator>,
}

struct Stores {
    invitations: Arc<dyn InvitationRegistry>,
    grants: Arc<dyn GrantStore>,
    incidents: Arc<dyn IncidentLog>,
}

fn open_stores(config: &RootConfig) -> RootResult<Stores> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            std::fs::create_dir_all(&config.data_dir).map_err(|e| {
                RootError::Internal(format!(
                    "failed to create data directory {}: {}",
                    config.data_dir.display(),
                    e
                ))
            })?;
            let path = config.database_path();
            let store = Arc::new(SqliteStore::open(&path)?);
            info!(database = %path.display(), "sqlite store opened");
            Ok(Stores {
                invitations: store.clone(),
                grants: store.clone(),
                incidents: store,
            })
        }
        StorageBackend::Memory => {
            info!("using in-memory stores; nothing will persist");
            Ok(Stores {
                invitations: Arc::new(InMemoryInvitationRegistry::new()),
                grants: Arc::new(InMemoryGrantStore::new()),
                incidents: Arc::new(InMemoryIncidentLog::new()),
            })
        }
    }
}

fn failure_source(config: &CheckpointConfig) -> RootResult<Arc<dyn FailureSource>> {
    let source = match config.failure_seed {
        Some(seed) => RandomFailure::seeded(config.sensor_failure_probability, seed)?,
        None => RandomFailure::new(config.sensor_failure_probability)?,
    };
    Ok(Arc::new(source))
}

/// Pretty JSON for machine-readable listings.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> RootResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Build every subsystem from configuration.
pub fn initialize_root(config: RootConfig) -> RootResult<RootState> {
    config.validate()?;

    info!(
        data_dir = %config.data_dir.display(),
        backend = ?config.storage.backend,
        tiers = ?config.tiers.enabled,
        failure_probability = config.checkpoint.sensor_failure_probability,
        "initializing sentinel"
    );

    let stores = open_stores(&config)?;
    let catalog = TierCatalog::restricted_to(&config.tiers.enabled);
    let evaluator = PolicyEvaluator::new(
        catalog,
        stores.invitations.clone(),
        stores.grants.clone(),
        stores.incidents.clone(),
    );
    let directory = Arc::new(InMemoryDirectory::demo());
    let orchestrator = ScanOrchestrator::new(
        evaluator,
        stores.grants.clone(),
        stores.incidents.clone(),
        failure_source(&config.checkpoint)?,
    )
    .with_directory(directory.clone());

    Ok(RootState {
        config,
        invitations: stores.invitations,
        grants: stores.grants,
        incidents: stores.incidents,
        directory,
        orchestrator: Arc::new(orchestrator),
    })
}

impl RootState {
    pub fn catalog(&self) -> &TierCatalog {
        self.orchestrator.evaluator().catalog()
    }

    /// Register an invitation. Known subjects are registered under their
    /// subject id; anything else (e.g. a national id) is stored as given.
    pub fn invite(&self, identifier: &str) -> RootResult<InvitationRecord> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(SentinelError::InvalidInput("invitation identifier is empty".into()).into());
        }
        let subject_id = match self.directory.resolve(identifier)? {
            Some(subject) => subject.id,
            None => SubjectId::new(identifier),
        };
        let record = self.invitations.register(&subject_id)?;
        info!(subject = %record.subject_id, "invitation registered");
        Ok(record)
    }

    /// Scan by identifier. `tier` is a tier name or a destination name
    /// from the location table.
    pub fn scan(
        &self,
        station: &str,
        identifier: &str,
        tier: &str,
        modality: Modality,
    ) -> RootResult<ScanOutcome> {
        Ok(self
            .orchestrator
            .scan_identifier(StationId::new(station), identifier, tier, modality)?)
    }

    pub fn pending_reviews(&self) -> RootResult<Vec<PendingReview>> {
        Ok(self.orchestrator.pending_reviews()?)
    }

    pub fn approve(&self, review_id: &ReviewId, operator: &str) -> RootResult<Verdict> {
        Ok(self.orchestrator.approve(review_id, &OperatorId::new(operator))?)
    }

    pub fn reject(&self, review_id: &ReviewId, operator: &str) -> RootResult<Verdict> {
        Ok(self.orchestrator.reject(review_id, &OperatorId::new(operator))?)
    }

    pub fn recent_incidents(&self, limit: usize) -> RootResult<Vec<IncidentRecord>> {
        Ok(self.incidents.recent(limit)?)
    }

    pub fn grants(&self) -> RootResult<Vec<ApprovalGrant>> {
        Ok(self.grants.list()?)
    }

    pub fn verify_log(&self) -> RootResult<bool> {
        Ok(self.incidents.verify_chain()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> RootConfig {
        RootConfig {
            checkpoint: CheckpointConfig {
                sensor_failure_probability: 0.0,
                failure_seed: Some(1),
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
            },
            ..RootConfig::default()
        }
    }

    #[test]
    fn test_initialize_memory_backend() {
        let state = initialize_root(memory_config()).unwrap();
        assert_eq!(state.catalog().tiers().len(), 4);
        assert_eq!(state.invitations.count().unwrap(), 0);
        assert!(state.verify_log().unwrap());
    }

    #[test]
    fn test_initialize_rejects_invalid_config() {
        let mut config = memory_config();
        config.checkpoint.sensor_failure_probability = 3.0;
        assert!(matches!(initialize_root(config), Err(RootError::Config(_))));
    }

    #[test]
    fn test_invite_resolves_directory_identifier() {
        let state = initialize_root(memory_config()).unwrap();
        let record = state.invite("890101-14-5566").unwrap();
        assert_eq!(record.subject_id.as_str(), "V-1001");

        let raw = state.invite("X-9").unwrap();
        assert_eq!(raw.subject_id.as_str(), "X-9");
        assert!(state.invite("  ").is_err());
    }

    #[test]
    fn test_restricted_tiers_reject_scan() {
        let mut config = memory_config();
        config.tiers.enabled = vec![sentinel_core::Tier::Green];
        let state = initialize_root(config).unwrap();
        let err = state
            .scan("gate-1", "V-1001", "ORANGE", Modality::Qr)
            .unwrap_err();
        assert!(matches!(err, RootError::Checkpoint(_)));
    }

    #[test]
    fn test_scan_by_location_name() {
        let state = initialize_root(memory_config()).unwrap();
        let outcome = state
            .scan("gate-1", "V-1001", "Cafeteria", Modality::Qr)
            .unwrap();
        assert_eq!(
            outcome.verdict(),
            Some(Verdict::allow(sentinel_policy::reasons::OPEN_TIER))
        );

        let restricted = state
            .scan("gate-2", "V-1001", "NLDC Building", Modality::Qr)
            .unwrap();
        assert!(restricted.is_pending());
        assert_eq!(
            state.pending_reviews().unwrap()[0].tier,
            sentinel_core::Tier::Red1
        );

        assert!(state
            .scan("gate-3", "V-1001", "Parking Garage", Modality::Qr)
            .is_err());
    }

    #[test]
    fn test_incidents_render_as_json() {
        let state = initialize_root(memory_config()).unwrap();
        state
            .scan("gate-1", "V-1001", "ORANGE", Modality::Qr)
            .unwrap();
        let incidents = state.recent_incidents(10).unwrap();
        assert_eq!(incidents.len(), 1);

        let json = to_json(&incidents).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let entries = parsed.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["reason"], "no active invitation");

        let grants = state.grants().unwrap();
        assert_eq!(to_json(&grants).unwrap(), "[]");
    }
}
