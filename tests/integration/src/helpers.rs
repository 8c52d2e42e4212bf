//! Test helpers for integration tests
//!
//! Provides an in-process agent driven through `tower::ServiceExt::oneshot`,
//! extra presence sessions acting as peers, and the Redis availability check.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use board_agent::{create_app, AgentState};
use board_cache::{RedisPool, RedisPoolConfig};
use board_common::AppConfig;
use board_core::{GroupId, UserId};
use board_presence::{MemoryTransport, PresenceHandle, PresenceSession, SessionConfig};
use serde::{de::DeserializeOwned, Serialize};
use tower::ServiceExt;

/// Agent application over a shared in-process transport
pub struct TestAgent {
    pub app: Router,
    pub state: AgentState,
    pub transport: MemoryTransport,
}

impl TestAgent {
    /// Start an agent on a fresh transport
    pub fn start() -> Result<Self> {
        Self::start_on(MemoryTransport::new())
    }

    /// Start an agent on an existing transport, next to other sessions
    pub fn start_on(transport: MemoryTransport) -> Result<Self> {
        let config = test_config(&[])?;
        let handle = PresenceSession::spawn(
            Arc::new(transport.clone()),
            SessionConfig::from(&config.presence),
        );
        let state = AgentState::new(handle);

        Ok(Self {
            app: create_app(state.clone()),
            state,
            transport,
        })
    }

    /// Send one request through the router
    pub async fn request(&self, method: Method, path: &str, body: Option<String>) -> Result<Response> {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json)
            }
            None => Body::empty(),
        };

        Ok(self.app.clone().oneshot(builder.body(body)?).await?)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        self.request(Method::GET, path, None).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        self.request(Method::POST, path, Some(serde_json::to_string(body)?))
            .await
    }

    /// Make a PUT request with JSON body
    pub async fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        self.request(Method::PUT, path, Some(serde_json::to_string(body)?))
            .await
    }

    pub fn handle(&self) -> &PresenceHandle {
        self.state.handle()
    }
}

/// Configuration built from the given variables only, ignoring the real environment
pub fn test_config(vars: &[(&str, &str)]) -> Result<AppConfig> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();

    AppConfig::from_lookup(|key| vars.get(key).cloned())
        .map_err(|e| anyhow::anyhow!("Config error: {e}"))
}

/// Spawn a session already pointed at `group` as `user`
pub fn spawn_peer(transport: &MemoryTransport, user: &UserId, group: &GroupId) -> Result<PresenceHandle> {
    let handle = PresenceSession::spawn(Arc::new(transport.clone()), SessionConfig::default());
    handle.set_identity(Some(user.clone()))?;
    handle.set_group(Some(group.clone()))?;
    Ok(handle)
}

/// Let every spawned task run until it blocks
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Pool for the Redis named by `REDIS_URL`, if it is set and answering
pub async fn check_redis_env() -> Option<RedisPool> {
    dotenvy::dotenv().ok();

    let Ok(url) = std::env::var("REDIS_URL") else {
        eprintln!("Skipping test: REDIS_URL not set");
        return None;
    };

    let pool = RedisPool::new(RedisPoolConfig {
        url,
        ..RedisPoolConfig::default()
    })
    .ok()?;

    if let Err(e) = pool.health_check().await {
        eprintln!("Skipping test: Redis not reachable ({e})");
        return None;
    }
    Some(pool)
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(response: Response, expected_status: StatusCode) -> Result<T> {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    if status != expected_status {
        anyhow::bail!(
            "Expected status {}, got {}. Body: {}",
            expected_status,
            status,
            String::from_utf8_lossy(&bytes)
        );
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        anyhow::bail!(
            "Expected status {}, got {}. Body: {}",
            expected_status,
            status,
            String::from_utf8_lossy(&bytes)
        );
    }
    Ok(())
}
