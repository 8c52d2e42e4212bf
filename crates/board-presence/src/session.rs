//! Presence session - owner of the active group subscription
//!
//! One tokio task runs the whole subsystem: commands from the handle,
//! channel events, and the activity clock's deadline are all handled on that
//! task one at a time, so nothing below it needs locking.
//!
//! Each subscription gets a generation number and a liveness flag. Changing
//! identity or group revokes the flag before anything else, and every
//! message from the channel carries its generation; messages from an older
//! generation are discarded, so a slow acknowledgement for a group the user
//! already left can never touch the current map.

use board_common::PresenceSettings;
use board_core::{ChannelEvent, GroupId, PresenceStatus, TieBreak, UserId};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::channel::{PresenceChannel, SharedTransport};
use crate::clock::{ActivityClock, DEFAULT_QUIET_PERIOD};
use crate::query::{PresenceQuery, PresenceView};
use crate::reconciler::PresenceReconciler;
use crate::visibility::{ActivitySignal, VisibilityBridge};

/// Session tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Quiet period before the local user goes idle
    pub quiet_period: Duration,
    pub tie_break: TieBreak,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            tie_break: TieBreak::default(),
        }
    }
}

impl From<&PresenceSettings> for SessionConfig {
    fn from(settings: &PresenceSettings) -> Self {
        Self {
            quiet_period: settings.idle_timeout(),
            tie_break: settings.tie_break,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Presence session has shut down")]
    Closed,
}

#[derive(Debug)]
enum Command {
    SetIdentity(Option<UserId>),
    SetGroup(Option<GroupId>),
    SetSession(Option<UserId>, Option<GroupId>),
    Signal(ActivitySignal),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Messages from a subscription's open task, tagged with its generation
#[derive(Debug)]
enum Inbox {
    Opened {
        generation: u64,
        channel: PresenceChannel,
    },
    Event {
        generation: u64,
        event: ChannelEvent,
    },
}

/// Shared "is this still the active subscription" flag
#[derive(Debug, Clone)]
struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn revoke(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Everything owned by one group subscription
struct Subscription {
    generation: u64,
    group_id: GroupId,
    liveness: Liveness,
    /// Set once the open task reports back
    channel: Option<PresenceChannel>,
    clock: ActivityClock,
    bridge: Option<VisibilityBridge>,
    reconciler: PresenceReconciler,
    connected: bool,
}

impl Subscription {
    /// Apply one channel event; returns whether the view changed
    fn handle_event(&mut self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Subscribed => {
                let Some(channel) = &self.channel else {
                    return false;
                };
                if !channel.mark_subscribed() {
                    return false;
                }
                self.connected = true;
                channel.track(PresenceStatus::Online);
                self.clock.arm();

                tracing::info!(
                    group_id = %self.group_id,
                    user_id = %channel.user_id(),
                    "Presence subscription acknowledged"
                );
                true
            }
            ChannelEvent::Closed => {
                tracing::warn!(group_id = %self.group_id, "Transport closed the presence subscription");
                false
            }
            event if !self.connected => {
                tracing::debug!(
                    group_id = %self.group_id,
                    event = event.kind(),
                    "Dropping presence event received before acknowledgement"
                );
                false
            }
            event => self.reconciler.apply(&event, Utc::now()) > 0,
        }
    }

    fn view(&self) -> PresenceView {
        PresenceView {
            group_id: Some(self.group_id.clone()),
            connected: self.connected,
            records: self.reconciler.records().clone(),
        }
    }
}

/// Event loop owning identity, group and the active subscription
pub struct PresenceSession {
    transport: SharedTransport,
    config: SessionConfig,
    user_id: Option<UserId>,
    group_id: Option<GroupId>,
    generation: u64,
    active: Option<Subscription>,
    inbox: mpsc::UnboundedSender<Inbox>,
    view: watch::Sender<PresenceView>,
}

impl PresenceSession {
    /// Start a session task and return its handle
    ///
    /// The session stays closed until both an identity and a group are set.
    pub fn spawn(transport: SharedTransport, config: SessionConfig) -> PresenceHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (session, inbox) = Self::new(transport, config);
        let query = PresenceQuery::new(session.view.subscribe());

        tokio::spawn(session.run(commands_rx, inbox));

        PresenceHandle {
            commands: commands_tx,
            query,
        }
    }

    fn new(transport: SharedTransport, config: SessionConfig) -> (Self, mpsc::UnboundedReceiver<Inbox>) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (view, _) = watch::channel(PresenceView::default());

        let session = Self {
            transport,
            config,
            user_id: None,
            group_id: None,
            generation: 0,
            active: None,
            inbox: inbox_tx,
            view,
        };
        (session, inbox_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut inbox: mpsc::UnboundedReceiver<Inbox>,
    ) {
        tracing::debug!(quiet_period = ?self.config.quiet_period, "Presence session started");

        loop {
            let deadline = self.active.as_ref().and_then(|sub| sub.clock.deadline());

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown(done)) => {
                        self.teardown();
                        let _ = done.send(());
                        break;
                    }
                    Some(Command::Flush(done)) => {
                        while let Ok(message) = inbox.try_recv() {
                            self.handle_inbox(message);
                        }
                        let _ = done.send(());
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.teardown();
                        break;
                    }
                },
                Some(message) = inbox.recv() => self.handle_inbox(message),
                () = sleep_until(deadline) => {
                    if let Some(sub) = &self.active {
                        sub.clock.fire_if_due(Instant::now());
                    }
                }
            }
        }

        tracing::debug!("Presence session stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetIdentity(user_id) => {
                if self.user_id != user_id {
                    self.user_id = user_id;
                    self.reopen();
                }
            }
            Command::SetGroup(group_id) => {
                if self.group_id != group_id {
                    self.log_group_switch(group_id.as_ref());
                    self.group_id = group_id;
                    self.reopen();
                }
            }
            Command::SetSession(user_id, group_id) => {
                if self.user_id != user_id || self.group_id != group_id {
                    if self.group_id != group_id {
                        self.log_group_switch(group_id.as_ref());
                    }
                    self.user_id = user_id;
                    self.group_id = group_id;
                    self.reopen();
                }
            }
            Command::Signal(signal) => match self.active.as_ref().and_then(|sub| sub.bridge.as_ref()) {
                Some(bridge) => bridge.dispatch(signal),
                None => tracing::trace!(?signal, "No open channel, ignoring activity signal"),
            },
            Command::Flush(done) | Command::Shutdown(done) => {
                let _ = done.send(());
            }
        }
    }

    fn log_group_switch(&self, to: Option<&GroupId>) {
        tracing::info!(
            from = ?self.group_id.as_ref().map(GroupId::as_str),
            to = ?to.map(GroupId::as_str),
            "Switching presence group"
        );
    }

    fn handle_inbox(&mut self, message: Inbox) {
        match message {
            Inbox::Opened {
                generation,
                channel,
            } => match self.current_mut(generation) {
                Some(sub) => {
                    sub.bridge = Some(VisibilityBridge::attach(&sub.clock, &channel));
                    sub.channel = Some(channel);
                }
                None => {
                    tracing::debug!(generation, "Closing channel of a stale subscription");
                    channel.close();
                }
            },
            Inbox::Event { generation, event } => {
                let Some(sub) = self.current_mut(generation) else {
                    tracing::trace!(generation, event = event.kind(), "Dropping event of a stale subscription");
                    return;
                };
                if sub.handle_event(event) {
                    self.publish_view();
                }
            }
        }
    }

    fn current_mut(&mut self, generation: u64) -> Option<&mut Subscription> {
        self.active
            .as_mut()
            .filter(|sub| sub.generation == generation && sub.liveness.is_alive())
    }

    /// Tear down the current subscription and open one for the current
    /// identity and group, if both are known
    fn reopen(&mut self) {
        self.teardown();

        let (Some(user_id), Some(group_id)) = (self.user_id.clone(), self.group_id.clone()) else {
            tracing::debug!(
                has_identity = self.user_id.is_some(),
                has_group = self.group_id.is_some(),
                "Presence stays closed until identity and group are known"
            );
            return;
        };

        self.generation += 1;
        let liveness = Liveness::new();

        tokio::spawn(open_subscription(
            Arc::clone(&self.transport),
            group_id.clone(),
            user_id.clone(),
            self.generation,
            liveness.clone(),
            self.inbox.clone(),
        ));

        tracing::info!(
            group_id = %group_id,
            user_id = %user_id,
            generation = self.generation,
            "Opening presence subscription"
        );

        self.active = Some(Subscription {
            generation: self.generation,
            group_id,
            liveness,
            channel: None,
            clock: ActivityClock::new(self.config.quiet_period),
            bridge: None,
            reconciler: PresenceReconciler::new(self.config.tie_break),
            connected: false,
        });
        self.publish_view();
    }

    /// Clear the timer, drop the listeners, close the channel and discard the map
    fn teardown(&mut self) {
        let Some(Subscription {
            generation,
            group_id,
            liveness,
            channel,
            clock,
            bridge,
            reconciler,
            ..
        }) = self.active.take()
        else {
            return;
        };

        liveness.revoke();
        clock.dispose();
        drop(bridge);
        if let Some(channel) = channel {
            channel.close();
        }

        tracing::info!(
            group_id = %group_id,
            generation,
            known = reconciler.len(),
            "Presence subscription closed"
        );
        drop(reconciler);

        self.publish_view();
    }

    fn publish_view(&self) {
        let view = self
            .active
            .as_ref()
            .map_or_else(PresenceView::default, Subscription::view);
        self.view.send_replace(view);
    }
}

/// Sleep until `deadline`, or forever when there is none
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Open the channel off the session task and relay its events while alive
async fn open_subscription(
    transport: SharedTransport,
    group_id: GroupId,
    user_id: UserId,
    generation: u64,
    liveness: Liveness,
    inbox: mpsc::UnboundedSender<Inbox>,
) {
    let (channel, events) = PresenceChannel::open(transport, group_id, user_id).await;

    if !liveness.is_alive() {
        channel.close();
        return;
    }
    let opened = Inbox::Opened {
        generation,
        channel: channel.clone(),
    };
    if inbox.send(opened).is_err() {
        channel.close();
        return;
    }

    let Some(mut events) = events else {
        return;
    };
    while let Some(event) = events.recv().await {
        if !liveness.is_alive() || inbox.send(Inbox::Event { generation, event }).is_err() {
            break;
        }
    }
}

/// Handle to a running [`PresenceSession`]
///
/// Cloning is cheap. The session stops on [`PresenceHandle::shutdown`] or
/// once every handle is dropped.
#[derive(Debug, Clone)]
pub struct PresenceHandle {
    commands: mpsc::UnboundedSender<Command>,
    query: PresenceQuery,
}

impl PresenceHandle {
    /// Set or clear the local identity; any change reopens the channel
    pub fn set_identity(&self, user_id: Option<UserId>) -> Result<(), SessionError> {
        self.send(Command::SetIdentity(user_id))
    }

    /// Switch groups; any change reopens the channel
    pub fn set_group(&self, group_id: Option<GroupId>) -> Result<(), SessionError> {
        self.send(Command::SetGroup(group_id))
    }

    /// Replace identity and group together, reopening at most once
    pub fn set_session(&self, user_id: Option<UserId>, group_id: Option<GroupId>) -> Result<(), SessionError> {
        self.send(Command::SetSession(user_id, group_id))
    }

    pub fn signal(&self, signal: impl Into<ActivitySignal>) -> Result<(), SessionError> {
        self.send(Command::Signal(signal.into()))
    }

    /// Resolves once every earlier command and every already delivered
    /// channel event has been handled
    pub async fn flush(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Stop the session, closing any open channel; idempotent
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    #[must_use]
    pub fn query(&self) -> PresenceQuery {
        self.query.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}
