//! Redis Pub/Sub publisher.
//!
//! Publishes presence wire messages to group channels.

use board_core::{PresenceMeta, PresenceTopic};
use redis::AsyncCommands;

use crate::pool::{RedisPool, RedisResult};
use crate::presence::PresenceMessage;
use crate::pubsub::PubSubChannel;

/// Redis Pub/Sub publisher
#[derive(Clone, Debug)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    /// Create a new publisher
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Encode a presence message and publish it on the topic's channel,
    /// returning how many connections received it
    async fn send(&self, topic: &PresenceTopic, message: &PresenceMessage) -> RedisResult<u32> {
        let payload = serde_json::to_string(message)?;
        let channel = PubSubChannel::from(topic.clone()).name();

        let mut conn = self.pool.get().await?;
        let receivers: u32 = conn.publish(&channel, payload).await?;

        tracing::trace!(channel = %channel, receivers, "Published presence message");
        Ok(receivers)
    }

    /// Announce a tracked entry to a group's peers
    ///
    /// # Errors
    /// Returns an error if serialization or the Redis command fails
    pub async fn publish_track(
        &self,
        topic: &PresenceTopic,
        key: &str,
        meta: PresenceMeta,
    ) -> RedisResult<u32> {
        let message = PresenceMessage::Track {
            key: key.to_string(),
            meta,
        };
        self.send(topic, &message).await
    }

    /// Announce that a key stopped being tracked
    ///
    /// # Errors
    /// Returns an error if serialization or the Redis command fails
    pub async fn publish_untrack(&self, topic: &PresenceTopic, key: &str) -> RedisResult<u32> {
        let message = PresenceMessage::Untrack {
            key: key.to_string(),
        };
        self.send(topic, &message).await
    }
}
