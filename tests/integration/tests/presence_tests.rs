//! Presence scenarios over the in-process transport
//!
//! Run with: cargo test -p integration-tests --test presence_tests

use std::time::Duration;

use board_core::{ChannelEvent, PresenceStatus};
use board_presence::{InputKind, MemoryTransport, Visibility, DEFAULT_QUIET_PERIOD};
use integration_tests::{group, peer, settle, spawn_peer, topic, user};
use tokio::time::Instant;

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_sync_join_leave_final_map() {
    let transport = MemoryTransport::new();
    let me = spawn_peer(&transport, &user("me"), &group("g")).unwrap();
    let query = me.query();
    query.wait_until(|view| view.connected).await.unwrap();

    let g = topic("g");
    transport.deliver(&g, &ChannelEvent::Sync(vec![peer("A", PresenceStatus::Online)]));
    transport.deliver(&g, &ChannelEvent::Join(vec![peer("B", PresenceStatus::Online)]));
    transport.deliver(&g, &ChannelEvent::Leave(vec![peer("A", PresenceStatus::Online)]));

    let view = query
        .wait_until(|view| view.status(&user("A")) == PresenceStatus::Offline && view.records.contains_key(&user("A")))
        .await
        .unwrap();
    assert_eq!(view.status(&user("B")), PresenceStatus::Online);
    assert_eq!(view.status(&user("untouched")), PresenceStatus::Offline);

    me.shutdown().await;
}

#[tokio::test]
async fn test_disjoint_syncs_are_additive() {
    let transport = MemoryTransport::new();
    let me = spawn_peer(&transport, &user("me"), &group("g")).unwrap();
    let query = me.query();
    query.wait_until(|view| view.connected).await.unwrap();

    transport.deliver(&topic("g"), &ChannelEvent::Sync(vec![peer("a", PresenceStatus::Online)]));
    transport.deliver(&topic("g"), &ChannelEvent::Sync(vec![peer("b", PresenceStatus::Idle)]));

    let view = query
        .wait_until(|view| view.records.contains_key(&user("b")))
        .await
        .unwrap();
    assert_eq!(view.status(&user("a")), PresenceStatus::Online);
    assert_eq!(view.status(&user("b")), PresenceStatus::Idle);
}

#[tokio::test]
async fn test_peers_see_each_other_join_and_leave() {
    let transport = MemoryTransport::new();
    let alice = spawn_peer(&transport, &user("alice"), &group("g")).unwrap();
    let bob = spawn_peer(&transport, &user("bob"), &group("g")).unwrap();

    alice
        .query()
        .wait_until(|view| view.status(&user("bob")).is_online())
        .await
        .unwrap();
    bob.query()
        .wait_until(|view| view.status(&user("alice")).is_online())
        .await
        .unwrap();

    bob.shutdown().await;

    let view = alice
        .query()
        .wait_until(|view| view.status(&user("bob")) == PresenceStatus::Offline)
        .await
        .unwrap();
    assert!(view.status(&user("alice")).is_online());
}

#[tokio::test]
async fn test_groups_are_isolated() {
    let transport = MemoryTransport::new();
    let alice = spawn_peer(&transport, &user("alice"), &group("g1")).unwrap();
    let bob = spawn_peer(&transport, &user("bob"), &group("g2")).unwrap();

    alice.query().wait_until(|view| view.status(&user("alice")).is_online()).await.unwrap();
    bob.query().wait_until(|view| view.status(&user("bob")).is_online()).await.unwrap();
    settle().await;

    assert_eq!(alice.query().status(&user("bob")), PresenceStatus::Offline);
    assert_eq!(bob.query().status(&user("alice")), PresenceStatus::Offline);
}

// ============================================================================
// Degraded transport and group switching
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_subscription_stays_disconnected() {
    let transport = MemoryTransport::new();
    transport.set_available(false);
    let me = spawn_peer(&transport, &user("me"), &group("g")).unwrap();
    me.flush().await.unwrap();
    settle().await;
    me.flush().await.unwrap();

    me.signal(InputKind::KeyDown).unwrap();
    me.signal(Visibility::Hidden).unwrap();
    tokio::time::sleep(DEFAULT_QUIET_PERIOD * 2).await;
    me.flush().await.unwrap();

    let query = me.query();
    assert_eq!(transport.subscriber_count(&topic("g")), 1);
    assert!(!query.is_connected());
    assert_eq!(query.status(&user("me")), PresenceStatus::Offline);
    assert!(query.presence_map().is_empty());
    assert_eq!(transport.publish_attempts(), 0);
}

#[tokio::test]
async fn test_subscribe_failure_degrades_quietly() {
    let transport = MemoryTransport::new();
    transport.fail_subscribes(true);
    let me = spawn_peer(&transport, &user("me"), &group("g")).unwrap();
    settle().await;
    me.flush().await.unwrap();

    me.signal(InputKind::Scroll).unwrap();
    me.flush().await.unwrap();

    assert!(!me.query().is_connected());
    assert_eq!(me.query().group_id(), Some(group("g")));
    assert_eq!(transport.publish_attempts(), 0);
}

#[tokio::test]
async fn test_late_acknowledgement_of_previous_group_is_ignored() {
    let transport = MemoryTransport::new();
    transport.set_available(false);
    let me = spawn_peer(&transport, &user("me"), &group("g1")).unwrap();
    me.flush().await.unwrap();

    me.set_group(Some(group("g2"))).unwrap();
    me.flush().await.unwrap();
    settle().await;

    // whatever g1 still delivers must not reach g2's map
    transport.release_acknowledgements(&topic("g1"));
    transport.deliver(&topic("g1"), &ChannelEvent::Subscribed);
    transport.deliver(&topic("g1"), &ChannelEvent::Sync(vec![peer("ghost", PresenceStatus::Online)]));
    settle().await;
    me.flush().await.unwrap();

    let query = me.query();
    assert_eq!(query.group_id(), Some(group("g2")));
    assert!(!query.is_connected());
    assert!(query.presence_map().is_empty());

    transport.set_available(true);
    assert_eq!(transport.release_acknowledgements(&topic("g2")), 1);

    let view = query
        .wait_until(|view| view.status(&user("me")).is_online())
        .await
        .unwrap();
    assert!(view.connected);
    assert_eq!(view.status(&user("ghost")), PresenceStatus::Offline);
    assert_eq!(transport.subscriber_count(&topic("g1")), 0);
}

#[tokio::test]
async fn test_switching_group_discards_map() {
    let transport = MemoryTransport::new();
    let _bob = spawn_peer(&transport, &user("bob"), &group("g1")).unwrap();
    let me = spawn_peer(&transport, &user("me"), &group("g1")).unwrap();
    let query = me.query();
    query.wait_until(|view| view.status(&user("bob")).is_online()).await.unwrap();

    me.set_group(Some(group("g2"))).unwrap();

    let view = query
        .wait_until(|view| view.group_id == Some(group("g2")) && view.connected)
        .await
        .unwrap();
    assert!(!view.records.contains_key(&user("bob")));
}

// ============================================================================
// Activity clock and visibility
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_once_after_quiet_period_then_active_once() {
    let transport = MemoryTransport::new();
    let alice = spawn_peer(&transport, &user("alice"), &group("g")).unwrap();
    let observer = spawn_peer(&transport, &user("observer"), &group("g")).unwrap();
    let watch = observer.query();
    watch.wait_until(|view| view.status(&user("alice")).is_online()).await.unwrap();

    tokio::time::sleep(DEFAULT_QUIET_PERIOD + Duration::from_secs(1)).await;
    watch
        .wait_until(|view| view.status(&user("alice")) == PresenceStatus::Idle)
        .await
        .unwrap();
    // one initial online and one idle per session
    settle().await;
    assert_eq!(transport.publish_attempts(), 4);

    tokio::time::sleep(DEFAULT_QUIET_PERIOD).await;
    settle().await;
    assert_eq!(transport.publish_attempts(), 4);

    alice.signal(InputKind::PointerDown).unwrap();
    alice.signal(InputKind::KeyDown).unwrap();
    watch.wait_until(|view| view.status(&user("alice")).is_online()).await.unwrap();
    settle().await;
    assert_eq!(transport.publish_attempts(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_visibility_overrides_timer() {
    let transport = MemoryTransport::new();
    let alice = spawn_peer(&transport, &user("alice"), &group("g")).unwrap();
    let observer = spawn_peer(&transport, &user("observer"), &group("g")).unwrap();
    let watch = observer.query();
    watch.wait_until(|view| view.status(&user("alice")).is_online()).await.unwrap();

    // four minutes left on the quiet period
    tokio::time::sleep(Duration::from_secs(60)).await;
    let hidden_at = Instant::now();
    alice.signal(Visibility::Hidden).unwrap();
    watch
        .wait_until(|view| view.status(&user("alice")) == PresenceStatus::Idle)
        .await
        .unwrap();
    assert!(hidden_at.elapsed() < Duration::from_secs(1));

    alice.signal(Visibility::Visible).unwrap();
    watch.wait_until(|view| view.status(&user("alice")).is_online()).await.unwrap();

    // timer restarted from zero on show
    tokio::time::sleep(DEFAULT_QUIET_PERIOD - Duration::from_secs(1)).await;
    settle().await;
    assert!(watch.status(&user("alice")).is_online());

    tokio::time::sleep(Duration::from_secs(2)).await;
    watch
        .wait_until(|view| view.status(&user("alice")) == PresenceStatus::Idle)
        .await
        .unwrap();
}
