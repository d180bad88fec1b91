//! Ordinal trust scale shared by memberships and items.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How much a member trusts a group, or how much trust an item demands of
/// the groups it is shown to.
///
/// Ordered `Low < Medium < High`. The numeric form (1, 2, 3) is the stored
/// representation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    /// Lowest trust; shown to any group the owner belongs to.
    Low,
    /// Intermediate trust.
    Medium,
    /// Highest trust; the default requirement for new items.
    #[default]
    High,
}

/// Error returned when decoding an unknown trust level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trust level: {0}")]
pub struct UnknownTrustLevel(pub String);

impl TrustLevel {
    /// All levels in ascending order.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Stored ordinal value.
    pub const fn ordinal(self) -> i16 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Decode a stored ordinal.
    pub fn from_ordinal(value: i16) -> Result<Self, UnknownTrustLevel> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            other => Err(UnknownTrustLevel(other.to_string())),
        }
    }

    /// Whether this level satisfies `required`.
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        };
        f.write_str(label)
    }
}

impl FromStr for TrustLevel {
    type Err = UnknownTrustLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(UnknownTrustLevel(s.to_owned())),
        }
    }
}
