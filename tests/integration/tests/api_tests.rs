//! Agent HTTP tests
//!
//! Requests go straight through the router; no port is bound.
//!
//! Run with: cargo test -p integration-tests --test api_tests

use axum::http::StatusCode;
use board_core::PresenceStatus;
use integration_tests::{
    assert_json, assert_status, group, spawn_peer, user, ErrorBody, PresenceBody, TestAgent,
    UserPresenceBody,
};
use serde_json::json;

/// Agent joined to `g1` as `me`, waited until connected
async fn joined_agent() -> TestAgent {
    let agent = TestAgent::start().expect("Failed to start agent");
    let response = agent
        .put("/session", &json!({ "user_id": "me", "group_id": "g1" }))
        .await
        .unwrap();
    assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

    agent
        .state
        .query()
        .wait_until(|view| view.status(&user("me")).is_online())
        .await
        .unwrap();
    agent
}

// ============================================================================
// Health and reads
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let agent = TestAgent::start().unwrap();
    let response = agent.get("/health").await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_presence_before_session() {
    let agent = TestAgent::start().unwrap();

    let response = agent.get("/presence").await.unwrap();
    let body: PresenceBody = assert_json(response, StatusCode::OK).await.unwrap();

    assert!(!body.connected);
    assert!(body.group_id.is_none());
    assert!(body.members.is_empty());
}

#[tokio::test]
async fn test_presence_after_joining() {
    let agent = joined_agent().await;
    let bob = spawn_peer(&agent.transport, &user("bob"), &group("g1")).unwrap();
    agent
        .state
        .query()
        .wait_until(|view| view.status(&user("bob")).is_online())
        .await
        .unwrap();

    let response = agent.get("/presence").await.unwrap();
    let body: PresenceBody = assert_json(response, StatusCode::OK).await.unwrap();

    assert!(body.connected);
    assert_eq!(body.group_id.as_deref(), Some("g1"));
    let members: Vec<(&str, &str)> = body
        .members
        .iter()
        .map(|m| (m.user_id.as_str(), m.status.as_str()))
        .collect();
    assert_eq!(members, vec![("bob", "online"), ("me", "online")]);
    assert!(body.members.iter().all(|m| !m.last_seen.is_empty()));

    bob.shutdown().await;
}

#[tokio::test]
async fn test_user_presence() {
    let agent = joined_agent().await;

    let response = agent.get("/presence/me").await.unwrap();
    let body: UserPresenceBody = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(body.user_id, "me");
    assert_eq!(body.status, "online");
    assert!(body.online);

    let response = agent.get("/presence/nobody").await.unwrap();
    let body: UserPresenceBody = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(body.status, "offline");
    assert!(!body.online);
}

#[tokio::test]
async fn test_user_presence_rejects_blank_id() {
    let agent = TestAgent::start().unwrap();

    let response = agent.get("/presence/%20").await.unwrap();
    let body: ErrorBody = assert_json(response, StatusCode::BAD_REQUEST).await.unwrap();

    assert_eq!(body.code, "INVALID_USER_ID");
}

// ============================================================================
// Inputs
// ============================================================================

#[tokio::test]
async fn test_visibility_round_trip() {
    let agent = joined_agent().await;
    let query = agent.state.query();

    let response = agent.post("/visibility", &json!({ "visible": false })).await.unwrap();
    assert_status(response, StatusCode::ACCEPTED).await.unwrap();
    query
        .wait_until(|view| view.status(&user("me")) == PresenceStatus::Idle)
        .await
        .unwrap();

    let response = agent.post("/activity", &json!({ "kind": "pointer_down" })).await.unwrap();
    assert_status(response, StatusCode::ACCEPTED).await.unwrap();
    query
        .wait_until(|view| view.status(&user("me")).is_online())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_activity_rejects_unknown_kind() {
    let agent = TestAgent::start().unwrap();

    let response = agent.post("/activity", &json!({ "kind": "mouse_wiggle" })).await.unwrap();
    let body: ErrorBody = assert_json(response, StatusCode::BAD_REQUEST).await.unwrap();

    assert_eq!(body.code, "INVALID_BODY");
    assert!(!body.message.is_empty());
}

#[tokio::test]
async fn test_activity_before_session_is_accepted() {
    let agent = TestAgent::start().unwrap();

    let response = agent.post("/activity", &json!({ "kind": "key_down" })).await.unwrap();
    assert_status(response, StatusCode::ACCEPTED).await.unwrap();
}

// ============================================================================
// Session switching
// ============================================================================

#[tokio::test]
async fn test_session_rejects_blank_group() {
    let agent = TestAgent::start().unwrap();

    let response = agent
        .put("/session", &json!({ "user_id": "me", "group_id": "  " }))
        .await
        .unwrap();
    let body: ErrorBody = assert_json(response, StatusCode::BAD_REQUEST).await.unwrap();

    assert_eq!(body.code, "INVALID_GROUP_ID");
    assert!(agent.state.query().group_id().is_none());
}

#[tokio::test]
async fn test_clearing_session_closes_presence() {
    let agent = joined_agent().await;

    let response = agent.put("/session", &json!({ "user_id": "me", "group_id": null })).await.unwrap();
    assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

    let response = agent.get("/presence").await.unwrap();
    let body: PresenceBody = assert_json(response, StatusCode::OK).await.unwrap();
    assert!(!body.connected);
    assert!(body.members.is_empty());
}

#[tokio::test]
async fn test_session_closed_returns_503() {
    let agent = TestAgent::start().unwrap();
    agent.handle().shutdown().await;

    let response = agent.post("/visibility", &json!({ "visible": true })).await.unwrap();
    let body: ErrorBody = assert_json(response, StatusCode::SERVICE_UNAVAILABLE).await.unwrap();

    assert_eq!(body.code, "SESSION_CLOSED");
}
