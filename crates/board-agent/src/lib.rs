//! # board-agent
//!
//! Hosts one presence session per process and exposes it over HTTP: the
//! read-only presence view, plus the activity, visibility and session
//! inputs a browser client reports.

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{create_agent_state, create_app, run};
pub use state::AgentState;
