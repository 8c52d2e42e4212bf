//! Visibility bridge - routes local activity into the clock and clock
//! transitions into presence publishes

use board_core::PresenceStatus;
use serde::{Deserialize, Serialize};

use crate::channel::PresenceChannel;
use crate::clock::{ActivityClock, ClockTransition, ListenerGuard};

/// Foreground state of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    #[must_use]
    pub fn from_visible(visible: bool) -> Self {
        if visible {
            Self::Visible
        } else {
            Self::Hidden
        }
    }
}

/// Raw input that counts as user activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    PointerDown,
    KeyDown,
    Scroll,
    TouchStart,
}

/// Anything the local client reports about its user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    Input(InputKind),
    VisibilityChange(Visibility),
}

impl From<InputKind> for ActivitySignal {
    fn from(kind: InputKind) -> Self {
        Self::Input(kind)
    }
}

impl From<Visibility> for ActivitySignal {
    fn from(visibility: Visibility) -> Self {
        Self::VisibilityChange(visibility)
    }
}

/// Binds one clock to one channel for the lifetime of a subscription
///
/// Every idle/active transition of the clock is published on the channel
/// with a fresh timestamp. Dropping the bridge unregisters its listener.
#[derive(Debug)]
pub struct VisibilityBridge {
    clock: ActivityClock,
    _listener: ListenerGuard,
}

impl VisibilityBridge {
    pub fn attach(clock: &ActivityClock, channel: &PresenceChannel) -> Self {
        let channel = channel.clone();
        let listener = clock.subscribe(move |transition| {
            let status = match transition {
                ClockTransition::BecameIdle => PresenceStatus::Idle,
                ClockTransition::BecameActive => PresenceStatus::Online,
            };
            channel.track(status);
        });

        Self {
            clock: clock.clone(),
            _listener: listener,
        }
    }

    /// Feed one local signal to the clock
    pub fn dispatch(&self, signal: ActivitySignal) {
        tracing::trace!(?signal, "Dispatching activity signal");
        match signal {
            ActivitySignal::Input(_) => self.clock.on_signal(),
            ActivitySignal::VisibilityChange(Visibility::Hidden) => {
                self.clock.on_visibility_hidden();
            }
            ActivitySignal::VisibilityChange(Visibility::Visible) => {
                self.clock.on_visibility_visible();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use board_core::{ChannelEvent, GroupId, PresenceTopic, UserId};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn connected_channel(
        transport: &MemoryTransport,
    ) -> (PresenceChannel, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (channel, events) = PresenceChannel::open(
            Arc::new(transport.clone()),
            GroupId::parse("g1").unwrap(),
            UserId::parse("me").unwrap(),
        )
        .await;
        let mut events = events.unwrap();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Subscribed);
        assert!(channel.mark_subscribed());
        events.recv().await.unwrap(); // sync
        (channel, events)
    }

    async fn next_status(events: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> PresenceStatus {
        match events.recv().await.unwrap() {
            ChannelEvent::Join(peers) => peers[0].metas[0].parsed_status().unwrap(),
            other => panic!("expected join, got {other:?}"),
        }
    }

    #[test]
    fn test_signal_conversions() {
        assert_eq!(
            ActivitySignal::from(InputKind::Scroll),
            ActivitySignal::Input(InputKind::Scroll)
        );
        assert_eq!(
            ActivitySignal::from(Visibility::from_visible(false)),
            ActivitySignal::VisibilityChange(Visibility::Hidden)
        );
        assert_eq!(
            serde_json::from_str::<InputKind>("\"touch_start\"").unwrap(),
            InputKind::TouchStart
        );
    }

    #[tokio::test]
    async fn test_hidden_and_visible_publish_immediately() {
        let transport = MemoryTransport::new();
        let (channel, mut events) = connected_channel(&transport).await;
        let clock = ActivityClock::new(Duration::from_secs(300));
        clock.arm();
        let bridge = VisibilityBridge::attach(&clock, &channel);

        bridge.dispatch(Visibility::Hidden.into());
        assert_eq!(next_status(&mut events).await, PresenceStatus::Idle);
        assert!(clock.deadline().is_none());

        bridge.dispatch(Visibility::Visible.into());
        assert_eq!(next_status(&mut events).await, PresenceStatus::Online);
        assert!(clock.deadline().is_some());
    }

    #[tokio::test]
    async fn test_input_after_idle_publishes_online_once() {
        let transport = MemoryTransport::new();
        let (channel, mut events) = connected_channel(&transport).await;
        let clock = ActivityClock::new(Duration::from_secs(300));
        clock.arm();
        let bridge = VisibilityBridge::attach(&clock, &channel);

        bridge.dispatch(InputKind::KeyDown.into());
        bridge.dispatch(Visibility::Hidden.into());
        bridge.dispatch(InputKind::PointerDown.into());
        bridge.dispatch(InputKind::Scroll.into());

        assert_eq!(next_status(&mut events).await, PresenceStatus::Idle);
        assert_eq!(next_status(&mut events).await, PresenceStatus::Online);
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert!(events.try_recv().is_err());
        assert_eq!(transport.publish_attempts(), 2);
    }

    #[tokio::test]
    async fn test_dropping_bridge_stops_publishing() {
        let transport = MemoryTransport::new();
        let (channel, _events) = connected_channel(&transport).await;
        let clock = ActivityClock::new(Duration::from_secs(300));
        clock.arm();

        let bridge = VisibilityBridge::attach(&clock, &channel);
        assert_eq!(clock.listener_count(), 1);
        drop(bridge);
        assert_eq!(clock.listener_count(), 0);

        clock.on_visibility_hidden();
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.publish_attempts(), 0);
        assert!(transport.tracked(&PresenceTopic::group(GroupId::parse("g1").unwrap())).is_empty());
    }
}
