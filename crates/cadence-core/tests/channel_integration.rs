//! Realtime channel behavior against a local WebSocket server: the auth
//! handshake, reconnection after an unintentional close, and reconnect
//! suppression after an intentional disconnect.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use cadence_core::error::ChannelError;
use cadence_core::realtime::{ChannelConfig, ChannelState, RealtimeChannel, ServerFrame};

fn test_config(port: u16) -> ChannelConfig {
    ChannelConfig {
        auth_timeout: Duration::from_millis(500),
        ping_interval: Duration::from_secs(30),
        base_backoff: Duration::from_millis(50),
        max_backoff: Duration::from_millis(400),
        ..ChannelConfig::new(format!("ws://127.0.0.1:{port}"))
    }
}

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Accept one connection, read the auth frame, and answer it.
async fn accept_and_auth(listener: &TcpListener, reply: &str) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();
    let auth = ws.next().await.unwrap().unwrap();
    let auth: serde_json::Value = serde_json::from_str(auth.to_text().unwrap()).unwrap();
    assert_eq!(auth["type"], "auth");
    assert_eq!(auth["data"]["token"], "tok");
    ws.send(Message::Text(reply.to_string())).await.unwrap();
    ws
}

fn auth_success() -> String {
    serde_json::json!({
        "type": "auth:success",
        "userId": "u-1",
        "connections": 1,
        "session": null
    })
    .to_string()
}

#[tokio::test]
async fn connect_authenticates_and_delivers_the_grant() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let _ws = accept_and_auth(&listener, &auth_success()).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let channel = RealtimeChannel::connect(test_config(port), "tok".into(), inbound_tx)
        .await
        .unwrap();

    assert_eq!(channel.state(), ChannelState::Connected);
    match inbound_rx.recv().await.unwrap() {
        ServerFrame::AuthSuccess {
            user_id,
            connections,
            session,
        } => {
            assert_eq!(user_id, "u-1");
            assert_eq!(connections, 1);
            assert!(session.is_none());
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    channel.disconnect();
    assert_eq!(channel.state(), ChannelState::Disconnected);
    server.abort();
}

#[tokio::test]
async fn auth_rejection_fails_the_connect() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let reply = serde_json::json!({"type": "auth:error", "message": "bad token"}).to_string();
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        ws.send(Message::Text(reply)).await.unwrap();
    });

    let (inbound_tx, _inbound_rx) = mpsc::unbounded_channel();
    let result = RealtimeChannel::connect(test_config(port), "tok".into(), inbound_tx).await;

    match result {
        Err(ChannelError::AuthFailed(message)) => assert_eq!(message, "bad token"),
        other => panic!("expected auth failure, got {other:?}"),
    }
    server.abort();
}

#[tokio::test]
async fn silent_server_times_the_handshake_out() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        // Never answer the auth frame.
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let (inbound_tx, _inbound_rx) = mpsc::unbounded_channel();
    let result = RealtimeChannel::connect(test_config(port), "tok".into(), inbound_tx).await;

    assert!(matches!(result, Err(ChannelError::AuthTimeout)));
    server.abort();
}

#[tokio::test]
async fn unintentional_close_reconnects_with_a_fresh_handshake() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        // First connection: authenticate, then drop the socket.
        let ws = accept_and_auth(&listener, &auth_success()).await;
        drop(ws);
        // The channel must come back on its own and re-authenticate.
        let _ws = accept_and_auth(&listener, &auth_success()).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let channel = RealtimeChannel::connect(test_config(port), "tok".into(), inbound_tx)
        .await
        .unwrap();

    // Grant from the first connection, then a second one post-reconnect.
    assert!(matches!(
        inbound_rx.recv().await.unwrap(),
        ServerFrame::AuthSuccess { .. }
    ));
    let second = tokio::time::timeout(Duration::from_secs(3), inbound_rx.recv())
        .await
        .expect("reconnect did not happen")
        .unwrap();
    assert!(matches!(second, ServerFrame::AuthSuccess { .. }));
    assert_eq!(channel.state(), ChannelState::Connected);

    channel.disconnect();
    server.abort();
}

#[tokio::test]
async fn intentional_disconnect_schedules_no_reconnect() {
    let (listener, port) = bind().await;
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();

    let server = tokio::spawn(async move {
        let _ws = accept_and_auth(&listener, &auth_success()).await;
        // A reconnect would show up as a second accept.
        let second =
            tokio::time::timeout(Duration::from_millis(800), listener.accept()).await;
        second.is_ok()
    });

    let channel = RealtimeChannel::connect(test_config(port), "tok".into(), inbound_tx)
        .await
        .unwrap();
    let _ = inbound_rx.recv().await;
    channel.disconnect();

    let reconnected = server.await.unwrap();
    assert!(!reconnected, "intentional disconnect must not reconnect");
}

#[tokio::test]
async fn outbound_frames_reach_the_server() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_and_auth(&listener, &auth_success()).await;
        let frame = ws.next().await.unwrap().unwrap();
        let frame: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        frame
    });

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let channel = RealtimeChannel::connect(test_config(port), "tok".into(), inbound_tx)
        .await
        .unwrap();
    let _ = inbound_rx.recv().await;

    channel
        .send(cadence_core::realtime::ClientFrame::SessionPause)
        .unwrap();

    let received = server.await.unwrap();
    assert_eq!(received["type"], "session:pause");
    channel.disconnect();
}
