//! Test fixtures and data generators

use board_core::{GroupId, PeerPresence, PresenceMeta, PresenceStatus, PresenceTopic, UserId};
use chrono::Utc;
use serde::Deserialize;

pub fn user(id: &str) -> UserId {
    UserId::parse(id).expect("valid user id")
}

pub fn group(id: &str) -> GroupId {
    GroupId::parse(id).expect("valid group id")
}

pub fn topic(id: &str) -> PresenceTopic {
    PresenceTopic::group(group(id))
}

/// Group id that no other test run shares
pub fn unique_group() -> GroupId {
    group(&format!("it-{}", uuid::Uuid::new_v4()))
}

/// Peer entry as another client would publish it
pub fn peer(id: &str, status: PresenceStatus) -> PeerPresence {
    PeerPresence::single(id, PresenceMeta::tracked(&user(id), status, Utc::now()))
}

/// GET /presence response
#[derive(Debug, Deserialize)]
pub struct PresenceBody {
    pub connected: bool,
    pub group_id: Option<String>,
    pub members: Vec<MemberBody>,
}

#[derive(Debug, Deserialize)]
pub struct MemberBody {
    pub user_id: String,
    pub status: String,
    pub last_seen: String,
}

/// GET /presence/:user_id response
#[derive(Debug, Deserialize)]
pub struct UserPresenceBody {
    pub user_id: String,
    pub status: String,
    pub online: bool,
}

/// Error body of every 4xx/5xx
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
