//! [`PresenceTransport`] over Redis.
//!
//! Live updates travel on the pub/sub channel `presence:{group}`. Because
//! pub/sub keeps no history, the current entries of a group are mirrored in
//! the hash `presence_state:{group}` (field = presence key, value = JSON
//! [`PresenceMeta`]) so a new subscriber can be handed a snapshot.

use async_trait::async_trait;
use board_core::{
    ChannelEvent, PeerPresence, PresenceMeta, PresenceTopic, PresenceTransport, SubscriptionKey,
    TransportError, TransportResult, TransportSubscription, UserId,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use super::PresenceMessage;
use crate::pool::{RedisPool, RedisResult};
use crate::pubsub::{PubSubChannel, Publisher, ReceivedMessage, Subscriber, SubscriberConfig};

/// Key prefix of the per-group snapshot hash
pub const PRESENCE_STATE_PREFIX: &str = "presence_state:";

/// Tuning for [`RedisPresenceTransport`]
#[derive(Debug, Clone)]
pub struct RedisPresenceConfig {
    /// Snapshot hash expiry, refreshed on every track
    pub state_ttl: Duration,
    /// How long to wait for Redis to confirm a channel subscription
    pub subscribe_timeout: Duration,
}

impl Default for RedisPresenceConfig {
    fn default() -> Self {
        Self {
            state_ttl: Duration::from_secs(3600),
            subscribe_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&board_common::PresenceSettings> for RedisPresenceConfig {
    fn from(settings: &board_common::PresenceSettings) -> Self {
        Self {
            state_ttl: settings.state_ttl(),
            ..Self::default()
        }
    }
}

/// Redis presence transport
pub struct RedisPresenceTransport {
    pool: RedisPool,
    publisher: Publisher,
    subscriber: Arc<Subscriber>,
    config: RedisPresenceConfig,
    /// Stop signals of running forwarders, by subscription id
    forwarders: DashMap<Uuid, oneshot::Sender<()>>,
}

impl std::fmt::Debug for RedisPresenceTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPresenceTransport")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .field("subscriptions", &self.forwarders.len())
            .finish_non_exhaustive()
    }
}

impl RedisPresenceTransport {
    /// Create a transport on an existing pool
    ///
    /// Opens one dedicated pub/sub connection in the background.
    #[must_use]
    pub fn new(pool: RedisPool, config: RedisPresenceConfig) -> Self {
        let subscriber = Subscriber::new(SubscriberConfig {
            redis_url: pool.url().to_string(),
            ..SubscriberConfig::default()
        });

        Self {
            publisher: Publisher::new(pool.clone()),
            pool,
            subscriber: Arc::new(subscriber),
            config,
            forwarders: DashMap::new(),
        }
    }

    /// Create a transport from application config
    ///
    /// # Errors
    /// Returns [`TransportError::Unavailable`] if the pool cannot be created
    pub fn from_config(
        redis: &board_common::RedisConfig,
        settings: &board_common::PresenceSettings,
    ) -> TransportResult<Self> {
        let pool = RedisPool::from_config(redis)?;
        Ok(Self::new(pool, RedisPresenceConfig::from(settings)))
    }

    /// Name of the snapshot hash for a topic
    #[must_use]
    pub fn state_key(topic: &PresenceTopic) -> String {
        format!("{PRESENCE_STATE_PREFIX}{}", topic.group_id())
    }

    async fn snapshot(&self, topic: &PresenceTopic) -> RedisResult<Vec<PeerPresence>> {
        let fields = self.pool.hgetall(&Self::state_key(topic)).await?;
        Ok(parse_snapshot(fields))
    }
}

/// Turn the raw snapshot hash into peers, sorted by key
fn parse_snapshot(fields: HashMap<String, String>) -> Vec<PeerPresence> {
    let mut peers: Vec<PeerPresence> = fields
        .into_iter()
        .filter_map(|(key, raw)| match serde_json::from_str::<PresenceMeta>(&raw) {
            Ok(meta) => Some(PeerPresence::single(key, meta)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Skipping malformed presence entry");
                None
            }
        })
        .collect();
    peers.sort_by(|a, b| a.key.cmp(&b.key));
    peers
}

/// Relay one channel's messages to a subscription until stopped
async fn forward(
    channel: PubSubChannel,
    mut messages: broadcast::Receiver<ReceivedMessage>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop => break,
            received = messages.recv() => match received {
                Ok(msg) if msg.channel == channel => match msg.json::<PresenceMessage>() {
                    Ok(message) => {
                        tracing::trace!(channel = %channel, key = %message.key(), "Relaying presence message");
                        if events.send(message.into_event()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "Skipping malformed presence message");
                    }
                },
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %channel, skipped, "Presence relay lagged");
                }
                Err(RecvError::Closed) => {
                    let _ = events.send(ChannelEvent::Closed);
                    break;
                }
            },
        }
    }
}

#[async_trait]
impl PresenceTransport for RedisPresenceTransport {
    async fn subscribe(
        &self,
        topic: &PresenceTopic,
        presence_key: &UserId,
    ) -> TransportResult<TransportSubscription> {
        let channel = PubSubChannel::from(topic.clone());
        // receive from before the SUBSCRIBE so nothing between it and the snapshot is lost
        let messages = self.subscriber.receiver();

        match tokio::time::timeout(
            self.config.subscribe_timeout,
            self.subscriber.subscribe(&channel),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                // balances the queued subscribe once the listener gets to it
                let _ = self.subscriber.unsubscribe(&channel).await;
                return Err(TransportError::Unavailable(format!(
                    "no subscription confirmation for {channel}"
                )));
            }
        }

        let peers = match self.snapshot(topic).await {
            Ok(peers) => peers,
            Err(e) => {
                let _ = self.subscriber.unsubscribe(&channel).await;
                return Err(e.into());
            }
        };

        let key = SubscriptionKey::new(topic.clone(), presence_key.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let _ = events_tx.send(ChannelEvent::Subscribed);
        let _ = events_tx.send(ChannelEvent::Sync(peers));

        let (stop_tx, stop_rx) = oneshot::channel();
        self.forwarders.insert(key.id, stop_tx);
        tokio::spawn(forward(channel, messages, events_tx, stop_rx));

        tracing::info!(topic = %topic, user_id = %presence_key, "Redis presence subscription open");

        Ok(TransportSubscription {
            key,
            events: events_rx,
        })
    }

    async fn track(&self, key: &SubscriptionKey, meta: PresenceMeta) -> TransportResult<()> {
        let field = key.presence_key.as_str();

        self.pool
            .hset_json(&Self::state_key(&key.topic), field, &meta, self.config.state_ttl)
            .await?;
        self.publisher.publish_track(&key.topic, field, meta).await?;

        Ok(())
    }

    async fn unsubscribe(&self, key: &SubscriptionKey) -> TransportResult<()> {
        let Some((_, stop)) = self.forwarders.remove(&key.id) else {
            return Ok(());
        };
        let _ = stop.send(());

        let field = key.presence_key.as_str();
        let withdrawn = async {
            self.pool.hdel(&Self::state_key(&key.topic), field).await?;
            self.publisher.publish_untrack(&key.topic, field).await?;
            RedisResult::Ok(())
        }
        .await;

        self.subscriber
            .unsubscribe(&PubSubChannel::from(key.topic.clone()))
            .await?;

        tracing::info!(topic = %key.topic, user_id = %key.presence_key, "Redis presence subscription closed");

        withdrawn.map_err(Into::into)
    }
}
