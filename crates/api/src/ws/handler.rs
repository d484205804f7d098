use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use texsync_core::protocol::WS_SUBPROTOCOL;

use crate::state::AppState;
use crate::ws::session::Session;

/// How long a closing connection may take to flush queued frames.
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// GET /ws/projects/{project_id}
///
/// Upgrades to WebSocket, echoing the `live-latex-v1` subprotocol when the
/// client offers it. The transport's message limit sits above the docUpdate
/// ceiling so oversized updates still reach the session and get an ack.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(project_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let max_message = state.config.max_ws_message_bytes();
    ws.protocols([WS_SUBPROTOCOL])
        .max_message_size(max_message)
        .max_frame_size(max_message)
        .on_upgrade(move |socket| handle_socket(socket, state, project_id))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Runs the protocol session on the current task.
///   4. Cleans up on disconnect, letting queued frames (a Close) drain first.
async fn handle_socket(socket: WebSocket, state: AppState, project_id: String) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, project_id = %project_id, "WebSocket connected");

    let handle = state
        .ws_manager
        .add(conn_id.clone(), project_id.clone())
        .await;
    let mut rx = handle.receiver;

    let (mut sink, stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    Session::new(
        state.clone(),
        project_id,
        conn_id.clone(),
        handle.sender,
        handle.cancel,
    )
    .run(stream)
    .await;

    // Clean up: remove connection (cancels its watchers), then drain.
    state.ws_manager.remove(&conn_id).await;
    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
