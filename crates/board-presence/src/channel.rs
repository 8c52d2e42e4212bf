//! Presence channel - one group's subscription on a transport
//!
//! Opening never fails: if the transport cannot be reached the channel
//! comes back unconnected and every `track` is silently skipped. Publishes
//! are queued to a per-channel worker so callers never wait on the
//! transport, and they go out in the order they were made.

use board_core::{
    ChannelEvent, GroupId, PresenceMeta, PresenceStatus, PresenceTopic, PresenceTransport,
    SubscriptionKey, UserId,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Transport shared by every channel a session opens
pub type SharedTransport = Arc<dyn PresenceTransport>;

struct ChannelInner {
    group_id: GroupId,
    user_id: UserId,
    /// `None` when the subscription could not be established
    key: Option<SubscriptionKey>,
    subscribed: AtomicBool,
    closed: AtomicBool,
    outbox: Mutex<Option<mpsc::UnboundedSender<PresenceMeta>>>,
}

/// Handle to one group's presence subscription
///
/// Clones share the same subscription. It is released by [`close`] or once
/// the last clone is dropped.
///
/// [`close`]: PresenceChannel::close
#[derive(Clone)]
pub struct PresenceChannel {
    inner: Arc<ChannelInner>,
}

impl std::fmt::Debug for PresenceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceChannel")
            .field("group_id", &self.inner.group_id)
            .field("user_id", &self.inner.user_id)
            .field("connected", &self.is_connected())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl PresenceChannel {
    /// Subscribe to `group_id`'s presence topic as `user_id`
    ///
    /// Returns the channel and, if the transport accepted the subscription,
    /// its event stream. A refused subscription is logged and yields an
    /// unconnected channel with no stream.
    pub async fn open(
        transport: SharedTransport,
        group_id: GroupId,
        user_id: UserId,
    ) -> (Self, Option<mpsc::UnboundedReceiver<ChannelEvent>>) {
        let topic = PresenceTopic::group(group_id.clone());

        let (key, outbox, events) = match transport.subscribe(&topic, &user_id).await {
            Ok(subscription) => {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(publish_worker(transport, subscription.key.clone(), rx));
                (Some(subscription.key), Some(tx), Some(subscription.events))
            }
            Err(e) => {
                tracing::warn!(
                    group_id = %group_id,
                    user_id = %user_id,
                    error = %e,
                    "Presence transport unavailable, continuing without presence"
                );
                (None, None, None)
            }
        };

        let channel = Self {
            inner: Arc::new(ChannelInner {
                group_id,
                user_id,
                key,
                subscribed: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                outbox: Mutex::new(outbox),
            }),
        };

        (channel, events)
    }

    #[must_use]
    pub fn group_id(&self) -> &GroupId {
        &self.inner.group_id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.inner.user_id
    }

    /// Record the transport's subscription acknowledgement
    ///
    /// Returns `true` only for the first acknowledgement of an open channel.
    pub fn mark_subscribed(&self) -> bool {
        if self.inner.key.is_none() || self.is_closed() {
            return false;
        }
        !self.inner.subscribed.swap(true, Ordering::SeqCst)
    }

    /// Whether the subscription was acknowledged and the channel is still open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.subscribed.load(Ordering::SeqCst) && !self.is_closed()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Publish the local user's status as of now
    pub fn track(&self, status: PresenceStatus) -> bool {
        self.track_at(status, Utc::now())
    }

    /// Publish the local user's status with an explicit timestamp
    ///
    /// Best effort: returns whether the publish was queued. Nothing is
    /// queued before the subscription is acknowledged or after close.
    pub fn track_at(&self, status: PresenceStatus, last_seen: DateTime<Utc>) -> bool {
        if !self.is_connected() {
            tracing::trace!(
                group_id = %self.inner.group_id,
                status = %status,
                "Channel not connected, skipping track"
            );
            return false;
        }

        let meta = PresenceMeta::tracked(&self.inner.user_id, status, last_seen);
        let queued = self
            .inner
            .outbox
            .lock()
            .as_ref()
            .is_some_and(|outbox| outbox.send(meta).is_ok());

        if queued {
            tracing::debug!(
                group_id = %self.inner.group_id,
                user_id = %self.inner.user_id,
                status = %status,
                "Tracking local presence"
            );
        }
        queued
    }

    /// Unsubscribe and release the transport resources; idempotent
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // dropping the sender lets the worker drain and unsubscribe
        let outbox = self.inner.outbox.lock().take();
        drop(outbox);

        tracing::debug!(
            group_id = %self.inner.group_id,
            user_id = %self.inner.user_id,
            "Presence channel closed"
        );
    }
}

/// Sends queued publishes in order, then unsubscribes once the queue closes
async fn publish_worker(
    transport: SharedTransport,
    key: SubscriptionKey,
    mut outbox: mpsc::UnboundedReceiver<PresenceMeta>,
) {
    while let Some(meta) = outbox.recv().await {
        if let Err(e) = transport.track(&key, meta).await {
            tracing::warn!(
                topic = %key.topic,
                user_id = %key.presence_key,
                error = %e,
                "Presence publish failed"
            );
        }
    }

    if let Err(e) = transport.unsubscribe(&key).await {
        tracing::warn!(
            topic = %key.topic,
            user_id = %key.presence_key,
            error = %e,
            "Presence unsubscribe failed"
        );
    }
}
