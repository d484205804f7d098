//! Unit tests for `WsManager`.
//!
//! These tests exercise the WebSocket connection manager directly, without
//! performing any HTTP upgrades. They verify add/remove semantics, per
//! project delivery, cancellation scopes and graceful shutdown behaviour.

use axum::extract::ws::Message;
use texsync_api::ws::WsManager;

// ---------------------------------------------------------------------------
// Test: new manager starts with zero connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_manager_has_zero_connections() {
    let manager = WsManager::new();

    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: add() and remove() track the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_track_count() {
    let manager = WsManager::new();

    let _a = manager.add("conn-1".to_string(), "p1").await;
    let _b = manager.add("conn-2".to_string(), "p2").await;
    assert_eq!(manager.connection_count().await, 2);
    assert_eq!(manager.project_connection_count("p1").await, 1);

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 1);
    assert_eq!(manager.project_connection_count("p1").await, 0);
}

// ---------------------------------------------------------------------------
// Test: remove() cancels the connection scope; unknown ids are a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_cancels_scope() {
    let manager = WsManager::new();

    let handle = manager.add("conn-1".to_string(), "p1").await;
    let child = handle.cancel.child_token();

    manager.remove("nonexistent").await;
    assert!(!handle.cancel.is_cancelled());

    manager.remove("conn-1").await;
    assert!(handle.cancel.is_cancelled());
    assert!(child.is_cancelled());
}

// ---------------------------------------------------------------------------
// Test: send_to_project() reaches only that project's connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_to_project_is_scoped() {
    let manager = WsManager::new();

    let mut a = manager.add("conn-1".to_string(), "p1").await;
    let mut b = manager.add("conn-2".to_string(), "p2").await;

    let sent = manager
        .send_to_project("p1", Message::Text("hello".into()))
        .await;
    assert_eq!(sent, 1);

    assert!(matches!(a.receiver.try_recv(), Ok(Message::Text(t)) if t.as_str() == "hello"));
    assert!(b.receiver.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: broadcast() reaches every connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_everyone() {
    let manager = WsManager::new();

    let mut a = manager.add("conn-1".to_string(), "p1").await;
    let mut b = manager.add("conn-2".to_string(), "p2").await;

    manager.broadcast(Message::Text("all".into())).await;

    assert!(matches!(a.receiver.try_recv(), Ok(Message::Text(_))));
    assert!(matches!(b.receiver.try_recv(), Ok(Message::Text(_))));
}

// ---------------------------------------------------------------------------
// Test: close_project() closes and cancels only that project
// ---------------------------------------------------------------------------

#[tokio::test]
async fn close_project_closes_matching_connections() {
    let manager = WsManager::new();

    let mut a = manager.add("conn-1".to_string(), "p1").await;
    let b = manager.add("conn-2".to_string(), "p2").await;

    assert_eq!(manager.close_project("p1").await, 1);

    assert!(matches!(a.receiver.try_recv(), Ok(Message::Close(None))));
    assert!(a.cancel.is_cancelled());
    assert!(!b.cancel.is_cancelled());
    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() sends Close, cancels and clears all connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();

    let mut a = manager.add("conn-1".to_string(), "p1").await;
    let mut b = manager.add("conn-2".to_string(), "p1").await;

    manager.shutdown_all().await;

    assert_eq!(manager.connection_count().await, 0);
    assert!(matches!(a.receiver.try_recv(), Ok(Message::Close(None))));
    assert!(matches!(b.receiver.try_recv(), Ok(Message::Close(None))));
    assert!(a.cancel.is_cancelled());
    assert!(b.cancel.is_cancelled());
}

// ---------------------------------------------------------------------------
// Test: ping_all() sends a Ping to every connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_all_sends_ping() {
    let manager = WsManager::new();

    let mut a = manager.add("conn-1".to_string(), "p1").await;

    manager.ping_all().await;

    assert!(matches!(a.receiver.try_recv(), Ok(Message::Ping(_))));
}

// ---------------------------------------------------------------------------
// Test: heartbeat pings on its interval and stops when cancelled
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_pings_until_cancelled() {
    use std::sync::Arc;
    use std::time::Duration;

    use texsync_api::ws::start_heartbeat;
    use tokio_util::sync::CancellationToken;

    let manager = Arc::new(WsManager::new());
    let mut a = manager.add("conn-1".to_string(), "p1").await;
    let cancel = CancellationToken::new();

    let handle = start_heartbeat(Arc::clone(&manager), Duration::from_millis(20), cancel.clone());

    let first = tokio::time::timeout(Duration::from_secs(2), a.receiver.recv())
        .await
        .unwrap();
    assert!(matches!(first, Some(Message::Ping(_))));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}
