//! Redis Pub/Sub subscriber.
//!
//! One dedicated pub/sub connection per process, shared by every presence
//! subscription. Channels are reference counted: the Redis `SUBSCRIBE` is
//! issued for the first local subscriber and `UNSUBSCRIBE` after the last
//! one leaves. Messages fan out to local readers over a broadcast channel.

use crate::pubsub::PubSubChannel;
use futures_util::StreamExt;
use redis::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

/// Error type for subscriber operations
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to parse message: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<SubscriberError> for board_core::TransportError {
    fn from(err: SubscriberError) -> Self {
        match err {
            SubscriberError::ParseError(e) => Self::Serialization(e.to_string()),
            SubscriberError::ChannelClosed => Self::Closed,
            SubscriberError::Redis(_) | SubscriberError::Connection(_) => {
                Self::Unavailable(err.to_string())
            }
        }
    }
}

/// Result type for subscriber operations
pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// Received message from Pub/Sub
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Channel the message was received on
    pub channel: PubSubChannel,
    /// Raw payload
    pub payload: String,
}

impl ReceivedMessage {
    /// Create from raw Redis message
    fn from_redis(channel_name: &str, payload: String) -> Self {
        Self {
            channel: PubSubChannel::parse(channel_name),
            payload,
        }
    }

    /// Decode the payload as JSON
    ///
    /// # Errors
    /// Returns an error if the payload is not valid JSON for `T`
    pub fn json<T: DeserializeOwned>(&self) -> SubscriberResult<T> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Channel buffer size for broadcast
    pub broadcast_buffer: usize,
    /// Reconnection delay in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

type Ack = oneshot::Sender<SubscriberResult<()>>;

/// Commands for subscription management
#[derive(Debug)]
enum SubscriberCommand {
    Subscribe(String, Ack),
    Unsubscribe(String),
}

/// Local subscriber counts per Redis channel name
type ChannelCounts = Arc<RwLock<HashMap<String, usize>>>;

/// Redis Pub/Sub subscriber
#[derive(Debug)]
pub struct Subscriber {
    /// Local subscriber count per channel
    subscribed: ChannelCounts,
    /// Broadcast sender for messages
    broadcast_tx: broadcast::Sender<ReceivedMessage>,
    /// Control channel for subscription management
    control_tx: mpsc::Sender<SubscriberCommand>,
}

impl Subscriber {
    /// Create a new subscriber and start the background listener
    ///
    /// The connection is made in the background; commands issued before
    /// it is up are processed once it is.
    #[must_use]
    pub fn new(config: SubscriberConfig) -> Self {
        let (broadcast_tx, _) = broadcast::channel(config.broadcast_buffer);
        let (control_tx, control_rx) = mpsc::channel(32);
        let subscribed = ChannelCounts::default();

        tokio::spawn(Self::listener_loop(
            config,
            subscribed.clone(),
            broadcast_tx.clone(),
            control_rx,
        ));

        Self {
            subscribed,
            broadcast_tx,
            control_tx,
        }
    }

    /// Background listener loop
    async fn listener_loop(
        config: SubscriberConfig,
        subscribed: ChannelCounts,
        broadcast_tx: broadcast::Sender<ReceivedMessage>,
        mut control_rx: mpsc::Receiver<SubscriberCommand>,
    ) {
        loop {
            match Self::run_listener(&config, &subscribed, &broadcast_tx, &mut control_rx).await {
                Ok(true) => {
                    tracing::info!("Subscriber shutting down");
                    break;
                }
                Ok(false) => {
                    tracing::warn!("Pub/Sub stream ended, reconnecting");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Subscriber error, reconnecting");
                    tokio::time::sleep(tokio::time::Duration::from_millis(
                        config.reconnect_delay_ms,
                    ))
                    .await;
                }
            }
        }
    }

    /// Run the listener until error or shutdown
    async fn run_listener(
        config: &SubscriberConfig,
        subscribed: &ChannelCounts,
        broadcast_tx: &broadcast::Sender<ReceivedMessage>,
        control_rx: &mut mpsc::Receiver<SubscriberCommand>,
    ) -> SubscriberResult<bool> {
        let client = Client::open(config.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        // Restore channels held before a reconnect
        {
            let channels = subscribed.read().await;
            for channel in channels.keys() {
                pubsub.subscribe(channel).await?;
            }
        }

        tracing::info!("Subscriber connected to Redis");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                msg = stream.next() => {
                    let Some(msg) = msg else {
                        return Ok(false);
                    };
                    let channel_name = msg.get_channel_name().to_string();
                    let payload: String = msg.get_payload().unwrap_or_default();

                    tracing::trace!(channel = %channel_name, "Received Pub/Sub message");

                    // no local readers is fine
                    let _ = broadcast_tx.send(ReceivedMessage::from_redis(&channel_name, payload));
                }

                cmd = control_rx.recv() => {
                    match cmd {
                        Some(SubscriberCommand::Subscribe(channel, ack)) => {
                            // Need to drop stream to access pubsub
                            drop(stream);
                            let mut counts = subscribed.write().await;
                            let result = match counts.get_mut(&channel) {
                                Some(count) => {
                                    *count += 1;
                                    Ok(())
                                }
                                None => match pubsub.subscribe(&channel).await {
                                    Ok(()) => {
                                        counts.insert(channel.clone(), 1);
                                        tracing::debug!(channel = %channel, "Subscribed to channel");
                                        Ok(())
                                    }
                                    Err(e) => {
                                        tracing::warn!(channel = %channel, error = %e, "Failed to subscribe");
                                        Err(SubscriberError::Redis(e))
                                    }
                                },
                            };
                            drop(counts);
                            let _ = ack.send(result);
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Unsubscribe(channel)) => {
                            drop(stream);
                            let mut counts = subscribed.write().await;
                            let last = match counts.get_mut(&channel) {
                                Some(count) if *count > 1 => {
                                    *count -= 1;
                                    false
                                }
                                Some(_) => {
                                    counts.remove(&channel);
                                    true
                                }
                                None => false,
                            };
                            drop(counts);
                            if last {
                                if let Err(e) = pubsub.unsubscribe(&channel).await {
                                    tracing::warn!(channel = %channel, error = %e, "Failed to unsubscribe");
                                } else {
                                    tracing::debug!(channel = %channel, "Unsubscribed from channel");
                                }
                            }
                            stream = pubsub.on_message();
                        }
                        // every handle dropped
                        None => return Ok(true),
                    }
                }
            }
        }
    }

    /// Subscribe to a channel, resolving once Redis confirmed it
    ///
    /// # Errors
    /// Returns an error if Redis rejects the subscription or the listener is gone
    pub async fn subscribe(&self, channel: &PubSubChannel) -> SubscriberResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();

        self.control_tx
            .send(SubscriberCommand::Subscribe(channel.name(), ack_tx))
            .await
            .map_err(|_| SubscriberError::ChannelClosed)?;

        ack_rx.await.map_err(|_| SubscriberError::ChannelClosed)?
    }

    /// Release one local subscription to a channel
    ///
    /// # Errors
    /// Returns an error if the listener is gone
    pub async fn unsubscribe(&self, channel: &PubSubChannel) -> SubscriberResult<()> {
        self.control_tx
            .send(SubscriberCommand::Unsubscribe(channel.name()))
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }

    /// Get a receiver for broadcast messages
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<ReceivedMessage> {
        self.broadcast_tx.subscribe()
    }
}
