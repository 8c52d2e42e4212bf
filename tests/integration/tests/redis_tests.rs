//! Redis transport tests
//!
//! These tests require a running Redis instance named by `REDIS_URL` and
//! skip themselves otherwise.
//!
//! Run with: cargo test -p integration-tests --test redis_tests

use std::sync::Arc;
use std::time::Duration;

use board_cache::{RedisPresenceConfig, RedisPresenceTransport};
use board_core::{ChannelEvent, PresenceMeta, PresenceStatus, PresenceTopic, PresenceTransport};
use board_presence::{PresenceSession, SessionConfig};
use chrono::Utc;
use integration_tests::{check_redis_env, unique_group, user};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn next(events: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for presence event")
        .expect("presence stream ended")
}

#[tokio::test]
async fn test_subscribe_track_and_untrack() {
    let Some(pool) = check_redis_env().await else {
        return;
    };
    let first = RedisPresenceTransport::new(pool.clone(), RedisPresenceConfig::default());
    let second = RedisPresenceTransport::new(pool.clone(), RedisPresenceConfig::default());
    let topic = PresenceTopic::group(unique_group());

    let mut watcher = second.subscribe(&topic, &user("watcher")).await.unwrap();
    assert_eq!(next(&mut watcher.events).await, ChannelEvent::Subscribed);
    assert_eq!(next(&mut watcher.events).await, ChannelEvent::Sync(vec![]));

    let alice = first.subscribe(&topic, &user("alice")).await.unwrap();
    let meta = PresenceMeta::tracked(&user("alice"), PresenceStatus::Online, Utc::now());
    first.track(&alice.key, meta.clone()).await.unwrap();

    match next(&mut watcher.events).await {
        ChannelEvent::Join(peers) => {
            assert_eq!(peers[0].key, "alice");
            assert_eq!(peers[0].metas, vec![meta.clone()]);
        }
        other => panic!("expected join, got {other:?}"),
    }

    // a late subscriber gets the tracked entry in its snapshot
    let mut late = second.subscribe(&topic, &user("late")).await.unwrap();
    assert_eq!(next(&mut late.events).await, ChannelEvent::Subscribed);
    match next(&mut late.events).await {
        ChannelEvent::Sync(peers) => {
            assert_eq!(peers.len(), 1);
            assert_eq!(peers[0].metas[0].parsed_status(), Some(PresenceStatus::Online));
        }
        other => panic!("expected sync, got {other:?}"),
    }

    first.unsubscribe(&alice.key).await.unwrap();
    first.unsubscribe(&alice.key).await.unwrap();

    assert_eq!(next(&mut watcher.events).await.kind(), "leave");
    let state = pool
        .hgetall(&RedisPresenceTransport::state_key(&topic))
        .await
        .unwrap();
    assert!(state.is_empty());

    second.unsubscribe(&watcher.key).await.unwrap();
    second.unsubscribe(&late.key).await.unwrap();
}

#[tokio::test]
async fn test_sessions_over_redis() {
    let Some(pool) = check_redis_env().await else {
        return;
    };
    let group = unique_group();

    let spawn = |name: &str| {
        let transport = RedisPresenceTransport::new(pool.clone(), RedisPresenceConfig::default());
        let handle = PresenceSession::spawn(Arc::new(transport), SessionConfig::default());
        handle.set_identity(Some(user(name))).unwrap();
        handle.set_group(Some(group.clone())).unwrap();
        handle
    };
    let alice = spawn("alice");
    let bob = spawn("bob");

    timeout(
        WAIT,
        alice
            .query()
            .wait_until(|view| view.status(&user("bob")).is_online()),
    )
    .await
    .unwrap()
    .unwrap();

    bob.shutdown().await;

    timeout(
        WAIT,
        alice
            .query()
            .wait_until(|view| view.status(&user("bob")) == PresenceStatus::Offline),
    )
    .await
    .unwrap()
    .unwrap();

    alice.shutdown().await;
}
