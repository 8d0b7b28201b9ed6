use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SentinelError;

// ---------------------------------------------------------------------------
// Tier — ordered security classification of a destination zone
// ---------------------------------------------------------------------------

/// Fixed, ordered set of security tiers.
/// Exhaustive (no #[non_exhaustive]) so a new tier forces compile-time
/// review of every match site.
///
/// Ordering: Green < Orange < Red1 < Red2
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "GREEN")]
    Green,
    #[serde(rename = "ORANGE")]
    Orange,
    #[serde(rename = "RED_1")]
    Red1,
    #[serde(rename = "RED_2")]
    Red2,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Green, Tier::Orange, Tier::Red1, Tier::Red2];

    /// Canonical wire name, e.g. `RED_1`.
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Green => "GREEN",
            Tier::Orange => "ORANGE",
            Tier::Red1 => "RED_1",
            Tier::Red2 => "RED_2",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = SentinelError;

    /// Case-insensitive; `-` and spaces are accepted in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();
        match normalized.as_str() {
            "GREEN" => Ok(Tier::Green),
            "ORANGE" => Ok(Tier::Orange),
            "RED_1" | "RED1" => Ok(Tier::Red1),
            "RED_2" | "RED2" => Ok(Tier::Red2),
            _ => Err(SentinelError::UnknownTier(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PolicyClass — which inputs the evaluator consults for a tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyClass {
    /// Unconditional allow.
    Open,
    /// Allow iff the subject holds an active invitation or is staff.
    InvitationGated,
    /// Allow iff a persisted grant exists, otherwise manual review.
    ApprovalGated,
}

impl fmt::Display for PolicyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyClass::Open => write!(f, "open"),
            PolicyClass::InvitationGated => write!(f, "invitation-gated"),
            PolicyClass::ApprovalGated => write!(f, "approval-gated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Timestamp — canonical time representation (seconds + nanoseconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        chrono::Utc::now().into()
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
            nanoseconds: 0,
        }
    }

    pub fn to_rfc3339(&self) -> String {
        let dt =
            chrono::DateTime::from_timestamp(self.seconds_since_epoch as i64, self.nanoseconds);
        dt.map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            seconds_since_epoch: dt.timestamp() as u64,
            nanoseconds: dt.timestamp_subsec_nanos(),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed identifiers — prevent stringly-typed confusion
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(
    SubjectId,
    "Unique identifier of a subject (national ID or staff code)."
);
define_id!(OperatorId, "Identifier of the operator resolving a review.");
define_id!(StationId, "Identifier of a checkpoint station.");
define_id!(IncidentId, "Identifier of an incident record.");
define_id!(SessionId, "Identifier of a scan session.");
define_id!(ReviewId, "Identifier of a pending manual review.");

// ---------------------------------------------------------------------------
// Subject — read-only input supplied by the external directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubjectClass {
    Guest,
    Staff,
}

impl fmt::Display for SubjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectClass::Guest => write!(f, "GUEST"),
            SubjectClass::Staff => write!(f, "STAFF"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleAttributes {
    pub plate_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub display_name: String,
    pub class: SubjectClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<VehicleAttributes>,
}

impl Subject {
    pub fn guest(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: SubjectId::new(id),
            display_name: display_name.into(),
            class: SubjectClass::Guest,
            national_id: None,
            staff_code: None,
            vehicle: None,
        }
    }

    pub fn staff(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            class: SubjectClass::Staff,
            ..Self::guest(id, display_name)
        }
    }

    pub fn is_staff(&self) -> bool {
        self.class == SubjectClass::Staff
    }

    /// Identifiers under which the subject may appear in the invitation
    /// registry: the subject id, then the national id if it differs.
    pub fn invitation_keys(&self) -> Vec<SubjectId> {
        let mut keys = vec![self.id.clone()];
        if let Some(national) = &self.national_id {
            if national != self.id.as_str() {
                keys.push(SubjectId::new(national.clone()));
            }
        }
        keys
    }
}

// ---------------------------------------------------------------------------
// Modality — how the subject was presented to the scanner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Qr,
    Face,
    Plate,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Qr => write!(f, "QR"),
            Modality::Face => write!(f, "FACE"),
            Modality::Plate => write!(f, "PLATE"),
        }
    }
}

impl FromStr for Modality {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QR" => Ok(Modality::Qr),
            "FACE" => Ok(Modality::Face),
            "PLATE" => Ok(Modality::Plate),
            _ => Err(SentinelError::InvalidInput(format!(
                "unknown scan modality '{}'",
                s
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Invitations and grants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationRecord {
    pub subject_id: SubjectId,
    pub registered_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GrantDecision {
    Allowed,
    Denied,
}

impl fmt::Display for GrantDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantDecision::Allowed => write!(f, "ALLOWED"),
            GrantDecision::Denied => write!(f, "DENIED"),
        }
    }
}

impl FromStr for GrantDecision {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALLOWED" => Ok(GrantDecision::Allowed),
            "DENIED" => Ok(GrantDecision::Denied),
            other => Err(SentinelError::Serialization(format!(
                "unknown grant decision '{}'",
                other
            ))),
        }
    }
}

/// Most recent manual-review outcome for a (subject, tier) pair.
///
/// `sequence` is assigned by the store and strictly increases across
/// upserts; the grant with the higher sequence is the live one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalGrant {
    pub subject_id: SubjectId,
    pub tier: Tier,
    pub decision: GrantDecision,
    pub resolved_at: Timestamp,
    pub resolved_by: OperatorId,
    pub sequence: u64,
}

impl ApprovalGrant {
    pub fn is_allowed(&self) -> bool {
        self.decision == GrantDecision::Allowed
    }
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// SHA-256 link in the incident log hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidentHash(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl fmt::Display for IncidentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for IncidentHash {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)
            .map_err(|e| SentinelError::Serialization(format!("invalid incident hash: {}", e)))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SentinelError::Serialization("incident hash must be 32 bytes".into()))?;
        Ok(IncidentHash(arr))
    }
}

/// Append-only record of a refused access attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: IncidentId,
    pub timestamp: Timestamp,
    pub subject_ref: SubjectId,
    pub tier_context: Tier,
    pub reason: String,
    pub previous_hash: Option<IncidentHash>,
    pub hash: IncidentHash,
}

impl IncidentRecord {
    /// Operator-facing description, e.g. `Scan at [ORANGE]. no active invitation.`
    pub fn description(&self) -> String {
        format!("Scan at [{}]. {}.", self.tier_context, self.reason)
    }
}

// ---------------------------------------------------------------------------
// Verdict — three-way evaluation output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "UPPERCASE")]
pub enum Verdict {
    Allow(String),
    Deny(String),
    Pending(String),
}

impl Verdict {
    pub fn allow(reason: impl Into<String>) -> Self {
        Verdict::Allow(reason.into())
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Verdict::Deny(reason.into())
    }

    pub fn pending(reason: impl Into<String>) -> Self {
        Verdict::Pending(reason.into())
    }

    pub fn reason(&self) -> &str {
        match self {
            Verdict::Allow(r) | Verdict::Deny(r) | Verdict::Pending(r) => r,
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow(_))
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, Verdict::Deny(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Verdict::Pending(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow(r) => write!(f, "ALLOW ({})", r),
            Verdict::Deny(r) => write!(f, "DENY ({})", r),
            Verdict::Pending(r) => write!(f, "PENDING ({})", r),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

mod hex_bytes {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {} bytes", N)))
    }
}
