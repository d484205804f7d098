//! End-to-end WebSocket tests over a real socket.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use texsync_compiler::ExecutionMode;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use common::{build_test_app, TestApp};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, project_id: &str) -> (Client, Option<String>) {
    let mut request = format!("ws://{addr}/ws/projects/{project_id}")
        .into_client_request()
        .unwrap();
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static("live-latex-v1"),
    );
    let (client, response) = tokio_tungstenite::connect_async(request).await.unwrap();
    let protocol = response
        .headers()
        .get("sec-websocket-protocol")
        .map(|v| v.to_str().unwrap().to_string());
    (client, protocol)
}

async fn send(client: &mut Client, message: Value) {
    client.send(Message::Text(message.to_string())).await.unwrap();
}

async fn next_message(client: &mut Client) -> Message {
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .unwrap()
}

async fn next_event(client: &mut Client) -> Value {
    match next_message(client).await {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("Expected text frame, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test: subprotocol negotiation and ping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn negotiates_subprotocol() {
    let app = build_test_app(ExecutionMode::External).await;
    let project = app.create_project("Socket").await;
    let addr = serve(&app).await;

    let (mut client, protocol) = connect(addr, &project.project_id).await;
    assert_eq!(protocol.as_deref(), Some("live-latex-v1"));

    send(&mut client, json!({"type": "ping"})).await;
    let pong = next_event(&mut client).await;
    assert_eq!(pong["type"], "pong");
    assert_eq!(pong["projectId"], project.project_id.as_str());
    assert!(pong["ts"].is_string());
}

// ---------------------------------------------------------------------------
// Test: edit, compile, get the PDF
// ---------------------------------------------------------------------------

#[tokio::test]
async fn edit_and_compile_flow() {
    let app = build_test_app(ExecutionMode::Simulate).await;
    let project = app.create_project("Flow").await;
    let addr = serve(&app).await;
    let (mut client, _) = connect(addr, &project.project_id).await;

    send(
        &mut client,
        json!({"type": "docUpdate", "path": "main.tex", "content": "\\documentclass{article}", "revision": 1}),
    )
    .await;
    let ack = next_event(&mut client).await;
    assert_eq!(ack["op"], "docUpdate");
    assert_eq!(ack["revision"], 1);

    send(&mut client, json!({"type": "requestCompile", "revision": 1})).await;
    let ack = next_event(&mut client).await;
    assert_eq!(ack["op"], "requestCompile");
    assert_eq!(ack["revision"], 1);
    let queued = next_event(&mut client).await;
    assert_eq!(queued["type"], "compileQueued");
    assert_eq!(queued["revision"], "1");

    let succeeded = loop {
        let event = next_event(&mut client).await;
        assert_ne!(event["type"], "compileFailed", "{event}");
        if event["type"] == "compileSucceeded" {
            break event;
        }
    };
    assert_eq!(succeeded["jobId"], queued["jobId"]);
    assert_eq!(
        succeeded["pdfUrl"],
        format!("/files/{}/output.pdf", project.project_id).as_str()
    );

    // The artifact is reachable at the advertised URL.
    let pdf = common::get(&app.router, succeeded["pdfUrl"].as_str().unwrap()).await;
    assert_eq!(pdf.status(), 200);
}

// ---------------------------------------------------------------------------
// Test: oversized docUpdate closes with 1009
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_update_closes_with_1009() {
    let app = build_test_app(ExecutionMode::External).await;
    let project = app.create_project("Big").await;
    let addr = serve(&app).await;
    let (mut client, _) = connect(addr, &project.project_id).await;

    let content = "x".repeat(app.state.config.max_doc_update_bytes + 1);
    send(
        &mut client,
        json!({"type": "docUpdate", "content": content, "revision": 1}),
    )
    .await;

    let ack = next_event(&mut client).await;
    assert_eq!(ack["error"]["code"], "size_limit_exceeded");

    match next_message(&mut client).await {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1009),
        other => panic!("Expected close frame, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.state.ws_manager.connection_count().await, 0);
}
