//! Activity clock - idle detection for the local user
//!
//! The clock turns raw activity signals into two transitions, *became idle*
//! and *became active*, and hands them to registered listeners. It owns no
//! task: the quiet-period timer is a deadline the owner sleeps on and then
//! reports back through [`ActivityClock::fire_if_due`].
//!
//! A fresh clock is inert. Nothing is emitted and no deadline exists until
//! [`ActivityClock::arm`] is called, and after [`ActivityClock::dispose`]
//! every method is a no-op.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;

/// Quiet period before the local user is considered idle
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Transition emitted by the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTransition {
    BecameIdle,
    BecameActive,
}

type Listener = Arc<dyn Fn(ClockTransition) + Send + Sync>;

struct ClockState {
    quiet_period: Duration,
    armed: bool,
    idle: bool,
    deadline: Option<Instant>,
    alive: bool,
    next_listener_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Idle/active detector shared between the session loop and its listeners
#[derive(Clone)]
pub struct ActivityClock {
    state: Arc<Mutex<ClockState>>,
}

impl std::fmt::Debug for ActivityClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ActivityClock")
            .field("quiet_period", &state.quiet_period)
            .field("armed", &state.armed)
            .field("idle", &state.idle)
            .field("deadline", &state.deadline)
            .field("alive", &state.alive)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

impl ActivityClock {
    #[must_use]
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                quiet_period,
                armed: false,
                idle: false,
                deadline: None,
                alive: true,
                next_listener_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a transition listener
    ///
    /// The listener stays registered until the returned guard is dropped.
    pub fn subscribe<F>(&self, listener: F) -> ListenerGuard
    where
        F: Fn(ClockTransition) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        if state.alive {
            state.listeners.push((id, Arc::new(listener)));
        }

        ListenerGuard {
            state: Arc::downgrade(&self.state),
            id,
        }
    }

    /// Start the quiet-period timer; the clock reacts to signals from now on
    pub fn arm(&self) {
        let mut state = self.state.lock();
        if !state.alive {
            return;
        }
        state.armed = true;
        state.idle = false;
        state.deadline = quiet_deadline(state.quiet_period);
    }

    /// Raw activity: restart the quiet period, leaving idle if needed
    pub fn on_signal(&self) {
        let emit = {
            let mut state = self.state.lock();
            if !state.alive || !state.armed {
                return;
            }
            let was_idle = std::mem::replace(&mut state.idle, false);
            state.deadline = quiet_deadline(state.quiet_period);
            was_idle.then(|| Self::listeners(&state))
        };

        if let Some(listeners) = emit {
            Self::emit(&listeners, ClockTransition::BecameActive);
        }
    }

    /// Tab hidden: go idle now, whatever the timer says
    pub fn on_visibility_hidden(&self) {
        let listeners = {
            let mut state = self.state.lock();
            if !state.alive || !state.armed {
                return;
            }
            state.idle = true;
            state.deadline = None;
            Self::listeners(&state)
        };

        Self::emit(&listeners, ClockTransition::BecameIdle);
    }

    /// Tab visible: go active now and restart the quiet period from zero
    pub fn on_visibility_visible(&self) {
        let listeners = {
            let mut state = self.state.lock();
            if !state.alive || !state.armed {
                return;
            }
            state.idle = false;
            state.deadline = quiet_deadline(state.quiet_period);
            Self::listeners(&state)
        };

        Self::emit(&listeners, ClockTransition::BecameActive);
    }

    /// Emit *became idle* if the quiet period has run out by `now`
    ///
    /// Returns whether the transition fired. The deadline is cleared on
    /// firing, so it fires at most once until the next signal.
    pub fn fire_if_due(&self, now: Instant) -> bool {
        let listeners = {
            let mut state = self.state.lock();
            match state.deadline {
                Some(deadline) if state.alive && !state.idle && deadline <= now => {
                    state.idle = true;
                    state.deadline = None;
                    Self::listeners(&state)
                }
                _ => return false,
            }
        };

        Self::emit(&listeners, ClockTransition::BecameIdle);
        true
    }

    /// When the quiet period runs out, if a timer is pending
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.state.lock().deadline
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state.lock().idle
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Clear the timer and all listeners; later calls do nothing
    pub fn dispose(&self) {
        let listeners = {
            let mut state = self.state.lock();
            state.alive = false;
            state.armed = false;
            state.deadline = None;
            std::mem::take(&mut state.listeners)
        };
        // listeners may own clones of this clock; drop them outside the lock
        drop(listeners);
    }

    fn listeners(state: &ClockState) -> Vec<Listener> {
        state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    fn emit(listeners: &[Listener], transition: ClockTransition) {
        tracing::trace!(?transition, listeners = listeners.len(), "Activity clock transition");
        for listener in listeners {
            listener(transition);
        }
    }
}

/// Scoped listener registration; dropping it unregisters the listener
#[must_use = "the listener is removed as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ListenerGuard {
    state: Weak<Mutex<ClockState>>,
    id: u64,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            let removed = {
                let mut state = state.lock();
                state
                    .listeners
                    .iter()
                    .position(|(id, _)| *id == self.id)
                    .map(|index| state.listeners.remove(index))
            };
            drop(removed);
        }
    }
}

/// End of a quiet period starting now; `None` if it lies past what `Instant` can represent
fn quiet_deadline(quiet_period: Duration) -> Option<Instant> {
    Instant::now().checked_add(quiet_period)
}
