//! Presence channel events

mod channel_event;

pub use channel_event::{ChannelEvent, PeerPresence, PresenceMeta};
