//! Route definitions

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::{health, input, presence, session};
use crate::state::AgentState;

/// Create the agent router with all routes
pub fn create_router() -> Router<AgentState> {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(presence_routes())
        .merge(input_routes())
}

/// Read-only presence queries
fn presence_routes() -> Router<AgentState> {
    Router::new()
        .route("/presence", get(presence::get_presence))
        .route("/presence/:user_id", get(presence::get_user_presence))
}

/// Activity, visibility and session inputs
fn input_routes() -> Router<AgentState> {
    Router::new()
        .route("/activity", post(input::post_activity))
        .route("/visibility", post(input::post_visibility))
        .route("/session", put(session::put_session))
}
