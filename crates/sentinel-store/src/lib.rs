//! Sentinel persistence layer.
//!
//! Backends for the three durable stores the access engine depends on:
//! the invitation registry, the approval grant store and the incident log.
//! Each store is exposed through the traits in `sentinel-core` so callers
//! hold `Arc<dyn Trait>` and never a concrete backend.
//!
//! - `memory`: mutex-guarded in-process stores, used by tests and
//!   ephemeral runs.
//! - `sqlite` (feature `sqlite`, on by default): a single database file
//!   holding all three stores, surviving process restarts.
//! - `directory`: an in-memory subject directory standing in for the
//!   external identity service.

pub mod chain;
pub mod directory;
pub mod error;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use directory::InMemoryDirectory;
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryGrantStore, InMemoryIncidentLog, InMemoryInvitationRegistry};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
