//! Pub/Sub channel definitions.
//!
//! Defines the channel naming conventions for Redis Pub/Sub.

use board_core::{GroupId, PresenceTopic};

/// Pub/Sub channel types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PubSubChannel {
    /// Presence events for one group
    Presence(PresenceTopic),
    /// Custom channel name
    Custom(String),
}

impl PubSubChannel {
    /// Create the presence channel for a group
    #[must_use]
    pub fn presence(group_id: GroupId) -> Self {
        Self::Presence(PresenceTopic::group(group_id))
    }

    /// Create a custom channel
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// Get the Redis channel name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Presence(topic) => topic.name(),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Parse a channel name back to a `PubSubChannel`
    #[must_use]
    pub fn parse(name: &str) -> Self {
        PresenceTopic::parse(name).map_or_else(|| Self::Custom(name.to_string()), Self::Presence)
    }
}

impl From<PresenceTopic> for PubSubChannel {
    fn from(topic: PresenceTopic) -> Self {
        Self::Presence(topic)
    }
}

impl std::fmt::Display for PubSubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
