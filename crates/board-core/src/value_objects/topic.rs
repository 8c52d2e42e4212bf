//! Presence topic naming.
//!
//! One topic per group; every transport derives its channel name from here.

use super::GroupId;

/// Topic prefix for group presence channels
pub const PRESENCE_TOPIC_PREFIX: &str = "presence:";

/// Publish/subscribe topic scoped to one group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresenceTopic(GroupId);

impl PresenceTopic {
    /// Create the topic for a group
    #[must_use]
    pub fn group(group_id: GroupId) -> Self {
        Self(group_id)
    }

    /// Group this topic belongs to
    #[must_use]
    pub fn group_id(&self) -> &GroupId {
        &self.0
    }

    /// Get the wire channel name
    #[must_use]
    pub fn name(&self) -> String {
        format!("{PRESENCE_TOPIC_PREFIX}{}", self.0)
    }

    /// Parse a channel name back to a topic
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        name.strip_prefix(PRESENCE_TOPIC_PREFIX)
            .and_then(|id| GroupId::parse(id).ok())
            .map(Self)
    }
}

impl std::fmt::Display for PresenceTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
