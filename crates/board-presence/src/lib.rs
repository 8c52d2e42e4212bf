//! # board-presence
//!
//! Real-time group presence: who in the current group is online, idle or
//! offline, as seen by this client.
//!
//! ## Components
//!
//! - **ActivityClock**: turns input and visibility signals into idle/active transitions
//! - **PresenceChannel**: one group's subscription on a [`board_core::PresenceTransport`]
//! - **PresenceReconciler**: folds sync/join/leave events into one record per user
//! - **VisibilityBridge**: publishes the clock's transitions on the channel
//! - **PresenceQuery**: read-only view for UI-side callers
//! - **PresenceSession**: the event loop owning all of the above for the active group
//!
//! ## Example
//!
//! ```ignore
//! use board_presence::{InputKind, MemoryTransport, PresenceSession, SessionConfig};
//!
//! let handle = PresenceSession::spawn(Arc::new(MemoryTransport::new()), SessionConfig::default());
//! handle.set_identity(Some(user_id))?;
//! handle.set_group(Some(group_id))?;
//! handle.signal(InputKind::KeyDown)?;
//!
//! let status = handle.query().status(&peer_id);
//! ```

pub mod channel;
pub mod clock;
pub mod memory;
pub mod query;
pub mod reconciler;
pub mod session;
pub mod visibility;

pub use board_core::TieBreak;
pub use channel::{PresenceChannel, SharedTransport};
pub use clock::{ActivityClock, ClockTransition, ListenerGuard, DEFAULT_QUIET_PERIOD};
pub use memory::MemoryTransport;
pub use query::{PresenceQuery, PresenceView};
pub use reconciler::PresenceReconciler;
pub use session::{PresenceHandle, PresenceSession, SessionConfig, SessionError};
pub use visibility::{ActivitySignal, InputKind, Visibility, VisibilityBridge};
