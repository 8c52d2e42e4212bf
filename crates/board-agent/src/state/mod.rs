//! Agent state shared by every handler

use board_presence::{PresenceHandle, PresenceQuery};

#[derive(Clone)]
pub struct AgentState {
    /// Handle to the running presence session
    handle: PresenceHandle,
}

impl AgentState {
    pub fn new(handle: PresenceHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &PresenceHandle {
        &self.handle
    }

    /// Fresh read handle onto the session's presence view
    pub fn query(&self) -> PresenceQuery {
        self.handle.query()
    }
}

impl std::fmt::Debug for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentState")
            .field("handle", &self.handle)
            .finish()
    }
}
