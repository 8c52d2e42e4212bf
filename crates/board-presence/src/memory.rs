//! In-process presence transport
//!
//! A complete broker living in one process: topics keep their tracked
//! entries, new subscribers get `Subscribed` followed by a `Sync` snapshot,
//! tracks fan out as `Join`, and the last subscription of a key leaving
//! fans out as `Leave`. Used by single-process deployments and by tests,
//! which can also inject failures and raw events.

use async_trait::async_trait;
use board_core::{
    ChannelEvent, PeerPresence, PresenceMeta, PresenceTopic, PresenceTransport, SubscriptionKey,
    TransportError, TransportResult, TransportSubscription, UserId,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug)]
struct MemorySubscriber {
    id: Uuid,
    tx: mpsc::UnboundedSender<ChannelEvent>,
    acked: bool,
}

#[derive(Debug)]
struct TrackedEntry {
    id: Uuid,
    key: String,
    meta: PresenceMeta,
}

#[derive(Debug, Default)]
struct TopicState {
    subscribers: Vec<MemorySubscriber>,
    /// Oldest first; a re-track moves the entry to the end
    tracked: Vec<TrackedEntry>,
}

impl TopicState {
    /// Tracked entries grouped per key, keys in order of first appearance
    fn snapshot(&self) -> Vec<PeerPresence> {
        let mut peers: Vec<PeerPresence> = Vec::new();
        for entry in &self.tracked {
            match peers.iter_mut().find(|p| p.key == entry.key) {
                Some(peer) => peer.metas.push(entry.meta.clone()),
                None => peers.push(PeerPresence::single(entry.key.clone(), entry.meta.clone())),
            }
        }
        peers
    }

    fn acknowledge(&mut self, index: usize) {
        let snapshot = self.snapshot();
        let subscriber = &mut self.subscribers[index];
        let _ = subscriber.tx.send(ChannelEvent::Subscribed);
        let _ = subscriber.tx.send(ChannelEvent::Sync(snapshot));
        subscriber.acked = true;
    }

    fn broadcast(&self, event: &ChannelEvent) {
        for subscriber in self.subscribers.iter().filter(|s| s.acked) {
            let _ = subscriber.tx.send(event.clone());
        }
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    topics: DashMap<PresenceTopic, TopicState>,
    unavailable: AtomicBool,
    reject_subscribes: AtomicBool,
    fail_publishes: AtomicBool,
    publish_attempts: AtomicU64,
}

/// In-process presence transport
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<MemoryInner>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable, new subscriptions are accepted but never
    /// acknowledged until [`MemoryTransport::release_acknowledgements`]
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Make `subscribe` fail outright
    pub fn fail_subscribes(&self, fail: bool) {
        self.inner.reject_subscribes.store(fail, Ordering::SeqCst);
    }

    /// Make `track` fail with [`TransportError::Publish`]
    pub fn fail_publishes(&self, fail: bool) {
        self.inner.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Acknowledge every pending subscription on `topic`, returning how many
    pub fn release_acknowledgements(&self, topic: &PresenceTopic) -> usize {
        let Some(mut state) = self.inner.topics.get_mut(topic) else {
            return 0;
        };
        let pending: Vec<usize> = state
            .subscribers
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.acked)
            .map(|(i, _)| i)
            .collect();
        for &index in &pending {
            state.acknowledge(index);
        }
        pending.len()
    }

    /// Push a raw event to every subscriber of `topic`, acknowledged or not
    pub fn deliver(&self, topic: &PresenceTopic, event: &ChannelEvent) -> usize {
        self.inner.topics.get(topic).map_or(0, |state| {
            for subscriber in &state.subscribers {
                let _ = subscriber.tx.send(event.clone());
            }
            state.subscribers.len()
        })
    }

    /// Number of `track` calls seen, failed ones included
    #[must_use]
    pub fn publish_attempts(&self) -> u64 {
        self.inner.publish_attempts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn subscriber_count(&self, topic: &PresenceTopic) -> usize {
        self.inner
            .topics
            .get(topic)
            .map_or(0, |state| state.subscribers.len())
    }

    /// Topics with at least one subscriber or tracked entry
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.inner.topics.len()
    }

    /// Entries currently tracked on `topic`
    #[must_use]
    pub fn tracked(&self, topic: &PresenceTopic) -> Vec<PeerPresence> {
        self.inner
            .topics
            .get(topic)
            .map(|state| state.snapshot())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PresenceTransport for MemoryTransport {
    async fn subscribe(
        &self,
        topic: &PresenceTopic,
        presence_key: &UserId,
    ) -> TransportResult<TransportSubscription> {
        if self.inner.reject_subscribes.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("memory transport offline".to_string()));
        }

        let key = SubscriptionKey::new(topic.clone(), presence_key.clone());
        let (tx, events) = mpsc::unbounded_channel();

        let mut state = self.inner.topics.entry(topic.clone()).or_default();
        state.subscribers.push(MemorySubscriber {
            id: key.id,
            tx,
            acked: false,
        });
        if !self.inner.unavailable.load(Ordering::SeqCst) {
            let index = state.subscribers.len() - 1;
            state.acknowledge(index);
        }

        tracing::trace!(topic = %topic, user_id = %presence_key, "Memory subscription added");

        Ok(TransportSubscription { key, events })
    }

    async fn track(&self, key: &SubscriptionKey, meta: PresenceMeta) -> TransportResult<()> {
        self.inner.publish_attempts.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_publishes.load(Ordering::SeqCst) {
            return Err(TransportError::Publish("injected publish failure".to_string()));
        }

        let mut state = self
            .inner
            .topics
            .get_mut(&key.topic)
            .ok_or(TransportError::Closed)?;
        if !state.subscribers.iter().any(|s| s.id == key.id) {
            return Err(TransportError::Closed);
        }

        state.tracked.retain(|entry| entry.id != key.id);
        state.tracked.push(TrackedEntry {
            id: key.id,
            key: key.presence_key.to_string(),
            meta: meta.clone(),
        });
        state.broadcast(&ChannelEvent::Join(vec![PeerPresence::single(
            key.presence_key.to_string(),
            meta,
        )]));

        Ok(())
    }

    async fn unsubscribe(&self, key: &SubscriptionKey) -> TransportResult<()> {
        {
            let Some(mut state) = self.inner.topics.get_mut(&key.topic) else {
                return Ok(());
            };

            state.subscribers.retain(|s| s.id != key.id);

            let presence_key = key.presence_key.as_str();
            let removed = state
                .tracked
                .iter()
                .position(|entry| entry.id == key.id)
                .map(|index| state.tracked.remove(index));
            let still_tracked = state.tracked.iter().any(|entry| entry.key == presence_key);

            if let Some(entry) = removed {
                if !still_tracked {
                    state.broadcast(&ChannelEvent::Leave(vec![PeerPresence::single(
                        entry.key,
                        entry.meta,
                    )]));
                }
            }
        }

        // the shard guard above must be gone before removing from the map
        self.inner
            .topics
            .remove_if(&key.topic, |_, state| state.subscribers.is_empty() && state.tracked.is_empty());

        tracing::trace!(topic = %key.topic, user_id = %key.presence_key, "Memory subscription removed");

        Ok(())
    }
}
