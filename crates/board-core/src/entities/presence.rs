//! Presence record entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;
use crate::value_objects::UserId;

/// Live status of a group member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// Connected and recently active
    Online,
    /// Connected, but no input for the quiet period or tab backgrounded
    Idle,
    /// Left the channel, or never seen
    #[default]
    Offline,
}

impl PresenceStatus {
    /// Wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Offline => "offline",
        }
    }

    #[must_use]
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PresenceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "idle" => Ok(Self::Idle),
            "offline" => Ok(Self::Offline),
            _ => Err(DomainError::InvalidStatus(s.to_string())),
        }
    }
}

/// Presence of one user within one group
///
/// At most one record exists per user per group; records are only ever
/// transitioned to [`PresenceStatus::Offline`], never removed, while the
/// owning subscription lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub status: PresenceStatus,
    /// Timestamp of the last status-affecting event
    pub last_seen: DateTime<Utc>,
}

impl PresenceRecord {
    #[must_use]
    pub fn new(user_id: UserId, status: PresenceStatus, last_seen: DateTime<Utc>) -> Self {
        Self {
            user_id,
            status,
            last_seen,
        }
    }

    /// Transition to offline as of `now`
    pub fn mark_offline(&mut self, now: DateTime<Utc>) {
        self.status = PresenceStatus::Offline;
        self.last_seen = now;
    }
}
