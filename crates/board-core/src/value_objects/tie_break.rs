//! Merge policy for duplicated entries within one delivered batch

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Decides which entry wins when a batch mentions the same peer more than once
///
/// Only applies inside a single delivered event. Across events the later
/// event always overwrites the earlier one, whatever the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Last element in delivery order wins
    #[default]
    LastDelivered,
    /// Greatest `last_seen` wins; equal or missing timestamps fall back to
    /// delivery order
    LatestLastSeen,
}

impl TieBreak {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastDelivered => "last_delivered",
            Self::LatestLastSeen => "latest_last_seen",
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TieBreak {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "last_delivered" => Ok(Self::LastDelivered),
            "latest_last_seen" => Ok(Self::LatestLastSeen),
            _ => Err(DomainError::InvalidTieBreak(s.to_string())),
        }
    }
}
