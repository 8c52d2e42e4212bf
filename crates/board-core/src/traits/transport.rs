//! Presence transport port
//!
//! A transport is the publish/subscribe service presence rides on. The
//! domain only needs three things from it: join a topic under a presence
//! key, publish this client's entry, and leave. Implementations live in
//! `board-cache` (Redis) and `board-presence` (in-memory).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::{ChannelEvent, PresenceMeta};
use crate::value_objects::{PresenceTopic, UserId};

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Subscription closed")]
    Closed,
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Identifies one live subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub topic: PresenceTopic,
    /// Key this subscriber's entries are grouped under
    pub presence_key: UserId,
    /// Distinguishes several subscriptions with the same presence key
    pub id: Uuid,
}

impl SubscriptionKey {
    #[must_use]
    pub fn new(topic: PresenceTopic, presence_key: UserId) -> Self {
        Self {
            topic,
            presence_key,
            id: Uuid::new_v4(),
        }
    }
}

/// Handle returned by [`PresenceTransport::subscribe`]
///
/// Events arrive in transport order. The first event is
/// [`ChannelEvent::Subscribed`] once the transport acknowledges the
/// subscription; it may never arrive.
#[derive(Debug)]
pub struct TransportSubscription {
    pub key: SubscriptionKey,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

#[async_trait]
pub trait PresenceTransport: Send + Sync {
    /// Join `topic` under `presence_key`
    async fn subscribe(
        &self,
        topic: &PresenceTopic,
        presence_key: &UserId,
    ) -> TransportResult<TransportSubscription>;

    /// Publish (or replace) this subscription's presence entry
    async fn track(&self, key: &SubscriptionKey, meta: PresenceMeta) -> TransportResult<()>;

    /// Leave the topic and withdraw this subscription's entry
    ///
    /// Peers observe a leave for the presence key. Whether the leave is held
    /// back while another subscription still tracks the same key is up to
    /// the transport.
    async fn unsubscribe(&self, key: &SubscriptionKey) -> TransportResult<()>;
}
