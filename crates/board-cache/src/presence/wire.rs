//! Messages exchanged on a group's presence channel

use board_core::{ChannelEvent, PeerPresence, PresenceMeta};
use serde::{Deserialize, Serialize};

/// Wire message published on `presence:{group}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PresenceMessage {
    /// A client published (or replaced) its entry
    Track {
        key: String,
        #[serde(default)]
        meta: PresenceMeta,
    },
    /// A client left the channel
    Untrack { key: String },
}

impl PresenceMessage {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Track { key, .. } | Self::Untrack { key } => key,
        }
    }

    /// Incremental event peers observe for this message
    #[must_use]
    pub fn into_event(self) -> ChannelEvent {
        match self {
            Self::Track { key, meta } => ChannelEvent::Join(vec![PeerPresence::single(key, meta)]),
            Self::Untrack { key } => ChannelEvent::Leave(vec![PeerPresence::new(key, Vec::new())]),
        }
    }
}
