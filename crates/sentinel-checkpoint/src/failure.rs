use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::error::{CheckpointError, CheckpointResult};
use crate::session::ScanRequest;

/// Default probability that a scan is unreadable.
pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.05;

/// Decides whether the sensor failed to read a scan.
///
/// Injected into the orchestrator so tests can force either branch.
pub trait FailureSource: Send + Sync {
    fn sensor_fails(&self, request: &ScanRequest) -> bool;
}

/// Bernoulli failure with a fixed probability.
pub struct RandomFailure {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl RandomFailure {
    /// Seeded from OS entropy.
    pub fn new(probability: f64) -> CheckpointResult<Self> {
        Self::build(probability, StdRng::from_entropy())
    }

    /// Deterministic sequence for reproducible runs.
    pub fn seeded(probability: f64, seed: u64) -> CheckpointResult<Self> {
        Self::build(probability, StdRng::seed_from_u64(seed))
    }

    fn build(probability: f64, rng: StdRng) -> CheckpointResult<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(CheckpointError::InvalidConfig(format!(
                "sensor failure probability must be between 0.0 and 1.0, got {}",
                probability
            )));
        }
        Ok(Self {
            probability,
            rng: Mutex::new(rng),
        })
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl FailureSource for RandomFailure {
    fn sensor_fails(&self, _request: &ScanRequest) -> bool {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(self.probability),
            Err(_) => {
                tracing::warn!("failure rng lock poisoned, treating scan as readable");
                false
            }
        }
    }
}

/// Sensor never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverFail;

impl FailureSource for NeverFail {
    fn sensor_fails(&self, _request: &ScanRequest) -> bool {
        false
    }
}

/// Sensor always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysFail;

impl FailureSource for AlwaysFail {
    fn sensor_fails(&self, _request: &ScanRequest) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::{Modality, StationId, Subject, Tier};

    fn request() -> ScanRequest {
        ScanRequest {
            station_id: StationId::new("gate-1"),
            subject: Subject::guest("G-1", "Guest"),
            tier: Tier::Green,
            modality: Modality::Qr,
        }
    }

    #[test]
    fn test_probability_bounds() {
        assert!(RandomFailure::new(-0.1).is_err());
        assert!(RandomFailure::new(1.5).is_err());
        assert!(RandomFailure::new(f64::NAN).is_err());
        assert_eq!(RandomFailure::new(0.05).unwrap().probability(), 0.05);
    }

    #[test]
    fn test_extremes_are_deterministic() {
        let never = RandomFailure::seeded(0.0, 1).unwrap();
        let always = RandomFailure::seeded(1.0, 1).unwrap();
        for _ in 0..100 {
            assert!(!never.sensor_fails(&request()));
            assert!(always.sensor_fails(&request()));
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a = RandomFailure::seeded(0.5, 42).unwrap();
        let b = RandomFailure::seeded(0.5, 42).unwrap();
        let seq_a: Vec<bool> = (0..32).map(|_| a.sensor_fails(&request())).collect();
        let seq_b: Vec<bool> = (0..32).map(|_| b.sensor_fails(&request())).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_rate_roughly_matches_probability() {
        let source = RandomFailure::seeded(0.05, 7).unwrap();
        let failures = (0..10_000)
            .filter(|_| source.sensor_fails(&request()))
            .count();
        assert!((300..=700).contains(&failures), "got {} failures", failures);
    }

    #[test]
    fn test_fixed_sources() {
        assert!(!NeverFail.sensor_fails(&request()));
        assert!(AlwaysFail.sensor_fails(&request()));
    }
}
