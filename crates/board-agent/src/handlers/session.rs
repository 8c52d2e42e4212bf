//! Identity and group switching

use axum::{extract::State, http::StatusCode};
use board_core::{GroupId, UserId};
use serde::Deserialize;

use crate::extractors::JsonBody;
use crate::response::ApiError;
use crate::state::AgentState;

/// A missing or `null` field clears that value
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub user_id: Option<String>,
    pub group_id: Option<String>,
}

/// Replace the session's identity and group
///
/// Both are validated before either is applied, then applied together so
/// the subscription is cycled at most once.
///
/// PUT /session
pub async fn put_session(
    State(state): State<AgentState>,
    JsonBody(body): JsonBody<SessionRequest>,
) -> Result<StatusCode, ApiError> {
    let user_id = body.user_id.as_deref().map(UserId::parse).transpose()?;
    let group_id = body.group_id.as_deref().map(GroupId::parse).transpose()?;

    tracing::info!(
        user_id = ?user_id.as_ref().map(UserId::as_str),
        group_id = ?group_id.as_ref().map(GroupId::as_str),
        "Session update requested"
    );

    let handle = state.handle();
    handle.set_session(user_id, group_id)?;
    handle.flush().await?;

    Ok(StatusCode::NO_CONTENT)
}
