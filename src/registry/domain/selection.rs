//! Tie-break policy between equally scored providers.

use super::ParseSelectionPolicyError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How to choose among providers with the same tag score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Earliest registered capability, then agent id.
    FirstHealthy,
    /// Newest heartbeat, then lowest agent id.
    #[default]
    MostRecentHeartbeat,
    /// Fewest bound consumers, then agent id.
    LeastLoaded,
}

impl SelectionPolicy {
    /// Returns the canonical configuration value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstHealthy => "first_healthy",
            Self::MostRecentHeartbeat => "most_recent_heartbeat",
            Self::LeastLoaded => "least_loaded",
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SelectionPolicy {
    type Error = ParseSelectionPolicyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "first_healthy" => Ok(Self::FirstHealthy),
            "most_recent_heartbeat" => Ok(Self::MostRecentHeartbeat),
            "least_loaded" => Ok(Self::LeastLoaded),
            _ => Err(ParseSelectionPolicyError(value.to_owned())),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = ParseSelectionPolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(value)
    }
}
