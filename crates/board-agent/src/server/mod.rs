//! Server setup and initialization

use std::sync::Arc;

use axum::Router;
use board_cache::RedisPresenceTransport;
use board_common::{AppConfig, AppError};
use board_presence::{MemoryTransport, PresenceSession, SessionConfig, SharedTransport};
use tokio::net::TcpListener;
use tracing::info;

use crate::middleware::apply_middleware;
use crate::routes::create_router;
use crate::state::AgentState;

/// Build the complete Axum application with all routes and middleware
pub fn create_app(state: AgentState) -> Router {
    let router = create_router();
    let router = apply_middleware(router);
    router.with_state(state)
}

/// Pick the presence transport: Redis when configured, in-process otherwise
pub fn create_transport(config: &AppConfig) -> Result<SharedTransport, AppError> {
    match &config.redis {
        Some(redis) => {
            info!("Using Redis presence transport");
            let transport = RedisPresenceTransport::from_config(redis, &config.presence)
                .map_err(|e| AppError::Cache(e.to_string()))?;
            Ok(Arc::new(transport))
        }
        None => {
            info!("REDIS_URL not set, using in-process presence transport");
            Ok(Arc::new(MemoryTransport::new()))
        }
    }
}

/// Start the presence session and create AgentState
///
/// Identity and group from the configuration, if present, are applied
/// right away.
pub async fn create_agent_state(config: AppConfig) -> Result<AgentState, AppError> {
    let transport = create_transport(&config)?;
    let handle = PresenceSession::spawn(transport, SessionConfig::from(&config.presence));

    handle
        .set_session(config.presence.user_id.clone(), config.presence.group_id.clone())
        .map_err(AppError::internal)?;

    Ok(AgentState::new(handle))
}

/// Run the HTTP server until Ctrl-C
pub async fn run_server(app: Router, address: &str) -> Result<(), AppError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {address}: {e}")))?;

    info!("Agent listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Run the complete agent with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let address = config.agent.address();

    let state = create_agent_state(config).await?;
    let handle = state.handle().clone();

    let app = create_app(state);
    let served = run_server(app, &address).await;

    // close the channel so peers see us leave
    handle.shutdown().await;
    info!("Presence session stopped");

    served
}
