//! Sentinel Policy
//!
//! Decides whether a subject may enter a zone at a given security tier.
//! Every request is evaluated as Subject + Tier = Verdict, producing a
//! three-way outcome: ALLOW, DENY, or PENDING (manual review required).
//!
//! Key features:
//! - Fixed, ordered tier catalog (GREEN < ORANGE < RED_1 < RED_2), each tier
//!   mapped to one policy class (open, invitation-gated, approval-gated)
//! - Invitation-gated denials are written to the incident log before the
//!   verdict is returned
//! - The evaluator reads approval grants but never writes them; only the
//!   manual-review resolver does
//! - Store failures surface as errors, never as a silent ALLOW or DENY

pub mod catalog;
pub mod error;
pub mod evaluator;

pub use catalog::{
    display_label, guidance, tier_for_location, Audience, Location, TierCatalog, LOCATIONS,
};
pub use error::{PolicyError, PolicyResult};
pub use evaluator::{reasons, PolicyEvaluator};
