//! Read-only presence queries
//!
//! The session loop publishes a fresh [`PresenceView`] after every change;
//! [`PresenceQuery`] reads the latest one without ever blocking on the loop.

use board_core::{GroupId, PresenceRecord, PresenceStatus, UserId};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::watch;

use crate::session::SessionError;

/// Snapshot of what the session currently knows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresenceView {
    /// Group of the active subscription, if any
    pub group_id: Option<GroupId>,
    /// Whether the active subscription was ever acknowledged
    pub connected: bool,
    pub records: HashMap<UserId, PresenceRecord>,
}

impl PresenceView {
    #[must_use]
    pub fn status(&self, user_id: &UserId) -> PresenceStatus {
        self.records
            .get(user_id)
            .map_or(PresenceStatus::Offline, |record| record.status)
    }

    /// Records ordered by user id
    #[must_use]
    pub fn members(&self) -> Vec<PresenceRecord> {
        let mut members: Vec<PresenceRecord> = self.records.values().cloned().collect();
        members.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        members
    }
}

/// Cheap, cloneable read handle
#[derive(Debug, Clone)]
pub struct PresenceQuery {
    rx: watch::Receiver<PresenceView>,
}

impl PresenceQuery {
    pub(crate) fn new(rx: watch::Receiver<PresenceView>) -> Self {
        Self { rx }
    }

    /// Status of `user_id`; anyone not known is `Offline`
    #[must_use]
    pub fn status(&self, user_id: &UserId) -> PresenceStatus {
        self.rx.borrow().status(user_id)
    }

    #[must_use]
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.status(user_id).is_online()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.rx.borrow().connected
    }

    #[must_use]
    pub fn group_id(&self) -> Option<GroupId> {
        self.rx.borrow().group_id.clone()
    }

    /// Copy of the full `user -> record` map
    #[must_use]
    pub fn presence_map(&self) -> HashMap<UserId, PresenceRecord> {
        self.rx.borrow().records.clone()
    }

    #[must_use]
    pub fn members(&self) -> Vec<PresenceRecord> {
        self.rx.borrow().members()
    }

    #[must_use]
    pub fn view(&self) -> PresenceView {
        self.rx.borrow().clone()
    }

    /// Wait until the published view satisfies `predicate`
    ///
    /// Checks the current view first. Fails with [`SessionError::Closed`]
    /// once the session is gone.
    pub async fn wait_until<F>(&self, mut predicate: F) -> Result<PresenceView, SessionError>
    where
        F: FnMut(&PresenceView) -> bool,
    {
        let mut rx = self.rx.clone();
        let view = rx
            .wait_for(|view| predicate(view))
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(view.clone())
    }
}
