//! Local activity inputs
//!
//! The browser side reports raw input and visibility changes here; they go
//! straight to the session's activity clock.

use axum::{extract::State, http::StatusCode};
use board_presence::{InputKind, Visibility};
use serde::Deserialize;

use crate::extractors::JsonBody;
use crate::response::ApiError;
use crate::state::AgentState;

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub kind: InputKind,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

/// POST /activity
pub async fn post_activity(
    State(state): State<AgentState>,
    JsonBody(body): JsonBody<ActivityRequest>,
) -> Result<StatusCode, ApiError> {
    tracing::trace!(kind = ?body.kind, "Activity reported");
    state.handle().signal(body.kind)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /visibility
pub async fn post_visibility(
    State(state): State<AgentState>,
    JsonBody(body): JsonBody<VisibilityRequest>,
) -> Result<StatusCode, ApiError> {
    let visibility = Visibility::from_visible(body.visible);
    tracing::debug!(?visibility, "Visibility changed");
    state.handle().signal(visibility)?;
    Ok(StatusCode::ACCEPTED)
}
