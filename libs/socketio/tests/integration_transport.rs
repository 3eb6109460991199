//! Integration tests for the bundled WebSocket transport
//!
//! A small Engine.IO server on a local port speaks just enough of the
//! protocol: open, namespace connect, one ping, and event echo.

mod common;

use common::wait_until;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use socketio::{Client, ClientOptions, EngineDialer, SocketIoError, TransportKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

const OPEN: &str =
    r#"0{"sid":"ws1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// Start the server and return its port plus a flag set on the first pong
///
/// `after_connect` is the raw frame sent right after the namespace connect.
async fn start_server(after_connect: &'static str) -> (u16, Arc<AtomicBool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let ponged = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ponged);

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(OPEN.to_string())).await.unwrap();

        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            verbose_println!("  server got: {}", text);

            if text == "40" {
                ws.send(Message::Text(r#"40{"sid":"n1"}"#.to_string())).await.unwrap();
                ws.send(Message::Text(after_connect.to_string())).await.unwrap();
            } else if text == "3" {
                flag.store(true, Ordering::SeqCst);
            } else if let Some(body) = text.strip_prefix("42") {
                let mut items: Vec<Value> = serde_json::from_str(body).unwrap();
                items[0] = json!("echo");
                let reply = format!("42{}", Value::Array(items));
                ws.send(Message::Text(reply)).await.unwrap();
            } else if text == "1" {
                break;
            }
        }
    });

    (port, ponged)
}

#[tokio::test]
async fn test_websocket_session_end_to_end() {
    verbose_println!("Testing websocket transport against a local server...");

    let (port, ponged) = start_server("2").await;
    let client = Client::with_dialer(
        &format!("http://127.0.0.1:{}/", port),
        ClientOptions::default()
            .with_transports(vec![TransportKind::WebSocket])
            .with_reconnection(false),
        Arc::new(EngineDialer::new().with_handshake_timeout(Duration::from_secs(3))),
    )
    .unwrap();

    let sid = Arc::new(Mutex::new(None::<String>));
    let slot = Arc::clone(&sid);
    client.on_connect(move |conn| {
        *slot.lock() = conn.sid();
        Ok(())
    });

    let echoed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&echoed);
    client.on_event("echo", move |_, args| {
        sink.lock().push(args);
        Vec::new()
    });

    client.connect().await.unwrap();
    assert!(wait_until(WAIT, || client.is_connected()).await);
    assert_eq!(sid.lock().as_deref(), Some("n1"));

    let conn = client.connection().unwrap();
    assert_eq!(conn.transport().kind(), TransportKind::WebSocket);
    assert_eq!(conn.id(), "ws1");

    client.emit("say", vec![json!("hi"), json!(2)]);
    assert!(wait_until(WAIT, || !echoed.lock().is_empty()).await);
    assert_eq!(echoed.lock()[0], vec![json!("hi"), json!(2)]);

    assert!(wait_until(WAIT, || ponged.load(Ordering::SeqCst)).await, "ping was not answered");

    client.close().await.unwrap();
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_malformed_frame_closes_connection() {
    verbose_println!("Testing a non-ASCII frame from the server...");

    let (port, _) = start_server("é").await;
    let client = Client::with_dialer(
        &format!("http://127.0.0.1:{}/", port),
        ClientOptions::default()
            .with_transports(vec![TransportKind::WebSocket])
            .with_reconnection(false),
        Arc::new(EngineDialer::new().with_handshake_timeout(Duration::from_secs(3))),
    )
    .unwrap();
    client.on_connect(|_| Ok(()));

    let errors = Arc::new(Mutex::new(Vec::new()));
    let error_sink = Arc::clone(&errors);
    client.on_error(move |_, err| error_sink.lock().push(err.clone()));

    let reason = Arc::new(Mutex::new(None::<String>));
    let slot = Arc::clone(&reason);
    client.on_disconnect(move |_, r| *slot.lock() = Some(r.to_string()));

    client.connect().await.unwrap();
    let conn = client.connection().unwrap();

    assert!(wait_until(WAIT, || reason.lock().is_some()).await, "disconnect not dispatched");
    assert_eq!(reason.lock().as_deref(), Some("parse error"));
    assert!(conn.is_terminated());
    assert!(!client.is_connected());
    assert!(wait_until(WAIT, || !errors.lock().is_empty()).await);
    assert!(matches!(errors.lock()[0], SocketIoError::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_server_fails_connect() {
    let client = Client::with_dialer(
        "http://127.0.0.1:1/",
        ClientOptions::default()
            .with_transports(vec![TransportKind::WebSocket])
            .with_reconnection(false),
        Arc::new(EngineDialer::new().with_handshake_timeout(Duration::from_secs(2))),
    )
    .unwrap();
    client.on_connect(|_| Ok(()));

    assert!(client.connect().await.is_err());
    assert!(client.connection().is_none());
}
