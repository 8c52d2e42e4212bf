//! # board-core
//!
//! Domain layer for group presence: identifiers, presence records, the channel
//! event vocabulary, and the publish/subscribe transport port.
//! This crate has zero dependencies on infrastructure (Redis, web framework, etc.).

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{PresenceRecord, PresenceStatus};
pub use error::DomainError;
pub use events::{ChannelEvent, PeerPresence, PresenceMeta};
pub use traits::{
    PresenceTransport, SubscriptionKey, TransportError, TransportResult, TransportSubscription,
};
pub use value_objects::{GroupId, PresenceTopic, TieBreak, UserId, PRESENCE_TOPIC_PREFIX};
