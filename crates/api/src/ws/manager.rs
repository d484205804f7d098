use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use texsync_core::types::{ProjectId, Timestamp};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Project the connection was opened for.
    pub project_id: ProjectId,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// Scope of the connection's session and watchers.
    pub cancel: CancellationToken,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

/// What a freshly registered connection needs to run.
pub struct WsHandle {
    pub sender: WsSender,
    pub receiver: mpsc::UnboundedReceiver<Message>,
    pub cancel: CancellationToken,
}

/// Manages all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection for `project_id`.
    ///
    /// Returns the sender, the receiver half of the message channel so the
    /// caller can forward messages to the WebSocket sink, and the
    /// connection's cancellation scope.
    pub async fn add(&self, conn_id: String, project_id: impl Into<ProjectId>) -> WsHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let conn = WsConnection {
            project_id: project_id.into(),
            sender: tx.clone(),
            cancel: cancel.clone(),
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        WsHandle {
            sender: tx,
            receiver: rx,
            cancel,
        }
    }

    /// Remove a connection by its ID and cancel its scope.
    pub async fn remove(&self, conn_id: &str) {
        if let Some(conn) = self.connections.write().await.remove(conn_id) {
            conn.cancel.cancel();
        }
    }

    /// Broadcast a message to all connected clients.
    ///
    /// Connections whose send channels are closed are silently skipped
    /// (they will be cleaned up on their next receive loop iteration).
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(message.clone());
        }
    }

    /// Send a message to every connection of one project.
    ///
    /// Returns the number of connections the message was sent to.
    pub async fn send_to_project(&self, project_id: &str, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.project_id == project_id {
                let _ = conn.sender.send(message.clone());
                count += 1;
            }
        }
        count
    }

    /// Close every connection of a project, e.g. after it was deleted.
    pub async fn close_project(&self, project_id: &str) -> usize {
        let mut conns = self.connections.write().await;
        let ids: Vec<String> = conns
            .iter()
            .filter(|(_, conn)| conn.project_id == project_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            if let Some(conn) = conns.remove(id) {
                let _ = conn.sender.send(Message::Close(None));
                conn.cancel.cancel();
            }
        }
        if !ids.is_empty() {
            tracing::info!(project_id, count = ids.len(), "Closed project WebSocket connections");
        }
        ids.len()
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of active connections for one project.
    pub async fn project_connection_count(&self, project_id: &str) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|conn| conn.project_id == project_id)
            .count()
    }

    /// Send a Close frame to every connection, cancel their scopes, then
    /// clear the map.
    ///
    /// Used during graceful shutdown; cancelling the scopes stops every
    /// status watcher.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
            conn.cancel.cancel();
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
