//! Presence read handlers
//!
//! Thin JSON views over [`board_presence::PresenceQuery`]; reads never fail
//! for lack of a connection, they just report everyone offline.

use axum::{extract::State, Json};
use board_core::{PresenceRecord, PresenceStatus, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extractors::PathParam;
use crate::response::ApiError;
use crate::state::AgentState;

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub user_id: String,
    pub status: PresenceStatus,
    pub last_seen: DateTime<Utc>,
}

impl From<PresenceRecord> for MemberResponse {
    fn from(record: PresenceRecord) -> Self {
        Self {
            user_id: record.user_id.into_inner(),
            status: record.status,
            last_seen: record.last_seen,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub connected: bool,
    pub group_id: Option<String>,
    pub members: Vec<MemberResponse>,
}

#[derive(Debug, Serialize)]
pub struct UserPresenceResponse {
    pub user_id: String,
    pub status: PresenceStatus,
    pub online: bool,
}

/// Full presence map of the current group
///
/// GET /presence
pub async fn get_presence(State(state): State<AgentState>) -> Json<PresenceResponse> {
    let view = state.query().view();

    Json(PresenceResponse {
        connected: view.connected,
        group_id: view.group_id.as_ref().map(ToString::to_string),
        members: view.members().into_iter().map(MemberResponse::from).collect(),
    })
}

/// Status of one user; unknown users are offline
///
/// GET /presence/:user_id
pub async fn get_user_presence(
    State(state): State<AgentState>,
    PathParam(user_id): PathParam<String>,
) -> Result<Json<UserPresenceResponse>, ApiError> {
    let user_id = UserId::parse(&user_id)?;
    let status = state.query().status(&user_id);

    Ok(Json(UserPresenceResponse {
        user_id: user_id.into_inner(),
        status,
        online: status.is_online(),
    }))
}
