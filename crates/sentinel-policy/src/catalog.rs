use sentinel_core::{PolicyClass, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PolicyError, PolicyResult};

// ---------------------------------------------------------------------------
// TierCatalog — static tier → policy class mapping
// ---------------------------------------------------------------------------

/// The configured set of tiers and the policy class applied to each.
///
/// Built once at startup; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCatalog {
    classes: BTreeMap<Tier, PolicyClass>,
}

impl TierCatalog {
    /// GREEN open, ORANGE invitation-gated, RED_1/RED_2 approval-gated.
    pub fn standard() -> Self {
        Self::restricted_to(&Tier::ALL)
    }

    /// Standard classes, limited to the given tiers.
    pub fn restricted_to(tiers: &[Tier]) -> Self {
        let classes = tiers
            .iter()
            .map(|&tier| (tier, default_class(tier)))
            .collect();
        Self { classes }
    }

    /// Policy class for a tier; `UnknownTier` when the tier is not configured.
    pub fn classify(&self, tier: Tier) -> PolicyResult<PolicyClass> {
        self.classes
            .get(&tier)
            .copied()
            .ok_or_else(|| PolicyError::UnknownTier(tier.to_string()))
    }

    /// Parse caller-supplied text and check it against the catalog, so bad
    /// scan input is rejected before it reaches the evaluator. A known
    /// destination name stands in for the tier guarding it.
    pub fn parse_tier(&self, raw: &str) -> PolicyResult<Tier> {
        let tier = match raw.parse::<Tier>() {
            Ok(tier) => tier,
            Err(e) => tier_for_location(raw).ok_or(e)?,
        };
        self.classify(tier)?;
        Ok(tier)
    }

    /// Configured tiers in ascending order.
    pub fn tiers(&self) -> Vec<Tier> {
        self.classes.keys().copied().collect()
    }

    pub fn contains(&self, tier: Tier) -> bool {
        self.classes.contains_key(&tier)
    }
}

impl Default for TierCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn default_class(tier: Tier) -> PolicyClass {
    match tier {
        Tier::Green => PolicyClass::Open,
        Tier::Orange => PolicyClass::InvitationGated,
        Tier::Red1 | Tier::Red2 => PolicyClass::ApprovalGated,
    }
}

// ---------------------------------------------------------------------------
// Display labels and visitor guidance
// ---------------------------------------------------------------------------

/// Who is reading a tier label. Visitors see concealed zone names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Operator,
    Visitor,
}

/// Label shown on badges and screens.
pub fn display_label(tier: Tier, audience: Audience) -> String {
    match audience {
        Audience::Operator => tier.as_str().replace('_', " "),
        Audience::Visitor => match tier {
            Tier::Green => "General Access",
            Tier::Orange => "Verified Tower Access",
            Tier::Red1 => "NLDC Building Access",
            Tier::Red2 => "CEO Office Access",
        }
        .to_string(),
    }
}

/// Instruction shown to the visitor after a verdict.
pub fn guidance(tier: Tier, pending: bool) -> &'static str {
    if pending {
        return "Your access is currently Pending. Please wait for security approval \
                or visit the operator desk.";
    }
    match tier {
        Tier::Green => "Proceed to general areas. Standard entry is always allowed.",
        Tier::Orange => {
            "Proceed to Platinum Towers (A–D). Access is active based on your invitation."
        }
        Tier::Red1 => "Proceed to NLDC Building. Verification required at building perimeter.",
        Tier::Red2 => "Proceed to Tower A Level 17/18. Management clearance required.",
    }
}

// ---------------------------------------------------------------------------
// Locations — named destinations and the tier guarding each
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub name: &'static str,
    pub concealed_name: &'static str,
    pub restricted: bool,
    pub tier: Tier,
}

pub const LOCATIONS: &[Location] = &[
    Location {
        name: "General Meeting Room A",
        concealed_name: "General Purpose Area A",
        restricted: false,
        tier: Tier::Green,
    },
    Location {
        name: "General Meeting Room B",
        concealed_name: "General Purpose Area B",
        restricted: false,
        tier: Tier::Green,
    },
    Location {
        name: "Cafeteria",
        concealed_name: "Dining Hall",
        restricted: false,
        tier: Tier::Green,
    },
    Location {
        name: "Tower A - Platinum",
        concealed_name: "Verified Tower Zone",
        restricted: true,
        tier: Tier::Orange,
    },
    Location {
        name: "Tower B - Platinum",
        concealed_name: "Verified Tower Zone",
        restricted: true,
        tier: Tier::Orange,
    },
    Location {
        name: "CEO Office (Tower A L17/18)",
        concealed_name: "High-Security Management Suite",
        restricted: true,
        tier: Tier::Red2,
    },
    Location {
        name: "NLDC Building",
        concealed_name: "System Control Center",
        restricted: true,
        tier: Tier::Red1,
    },
    Location {
        name: "Public Sports Facility",
        concealed_name: "General Activity Area",
        restricted: false,
        tier: Tier::Green,
    },
];

/// Tier guarding a destination, matched on its real or concealed name.
/// Concealed names may be shared; the first match wins.
pub fn tier_for_location(name: &str) -> Option<Tier> {
    let needle = name.trim();
    LOCATIONS
        .iter()
        .find(|l| {
            l.name.eq_ignore_ascii_case(needle) || l.concealed_name.eq_ignore_ascii_case(needle)
        })
        .map(|l| l.tier)
}
