//! End-to-end tests of the WebSocket transport against a loopback server.

#![cfg(feature = "websocket")]

use aiwire_realtime::{
    ChannelEventHandler, ClientEvent, CloseReason, ConnectivityState, RealtimeClientConfig,
    RealtimeSession, SessionEvent, WebSocketTransport,
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

const WAIT: Duration = Duration::from_secs(5);

/// What the loopback server saw.
struct Observed {
    authorization: oneshot::Receiver<Option<String>>,
    frames: mpsc::UnboundedReceiver<Value>,
}

/// Accept one connection, greet it with `session.created`, record its text frames, and
/// optionally close from the server side after the first frame.
async fn serve_once(close_after_first: Option<(u16, &'static str)>) -> (String, Observed) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (auth_tx, authorization) = oneshot::channel();
    let (frame_tx, frames) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut auth_tx = Some(auth_tx);
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let header = request
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if let Some(tx) = auth_tx.take() {
                let _ = tx.send(header);
            }
            Ok(response)
        })
        .await
        .unwrap();

        let greeting = json!({"type": "session.created", "event_id": "evt_1", "session": {"id": "sess_1"}});
        ws.send(Message::Text(greeting.to_string().into())).await.unwrap();

        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                let _ = frame_tx.send(serde_json::from_str::<Value>(text.as_str()).unwrap());
                if let Some((code, reason)) = close_after_first {
                    let frame = CloseFrame { code: CloseCode::from(code), reason: reason.into() };
                    let _ = ws.close(Some(frame)).await;
                }
            }
        }
    });

    (format!("ws://{addr}/v1/realtime"), Observed { authorization, frames })
}

fn session_for(
    config: &RealtimeClientConfig,
) -> (RealtimeSession, mpsc::UnboundedReceiver<SessionEvent>) {
    let transport = WebSocketTransport::new(config).unwrap();
    let (handler, events) = ChannelEventHandler::new();
    let session = RealtimeSession::builder()
        .transport(Arc::new(transport))
        .handler(Arc::new(handler))
        .connect_timeout(WAIT)
        .build()
        .unwrap();
    (session, events)
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_round_trip_and_clean_stop() {
    let (endpoint, mut observed) = serve_once(None).await;
    let config = RealtimeClientConfig::new(endpoint).with_api_key("sk-loop").with_model("voice-1");
    let (session, mut events) = session_for(&config);

    session.start().unwrap();
    session.wait_until_connected(WAIT).await.unwrap();
    assert_eq!(observed.authorization.await.unwrap().as_deref(), Some("Bearer sk-loop"));

    match next_event(&mut events).await {
        SessionEvent::Server(event) => {
            assert_eq!(event.event_type(), "session.created");
            assert_eq!(event.event_id(), "evt_1");
        }
        other => panic!("unexpected: {other:?}"),
    }

    session.send(&ClientEvent::user_text("hello").with_event_id("c1")).await.unwrap();
    let frame = tokio::time::timeout(WAIT, observed.frames.recv()).await.unwrap().unwrap();
    assert_eq!(frame["type"], "conversation.item.create");
    assert_eq!(frame["event_id"], "c1");
    assert_eq!(frame["item"]["content"][0]["text"], "hello");

    session.stop().await.unwrap();
    match next_event(&mut events).await {
        SessionEvent::Disconnected(disconnect) => {
            assert!(disconnect.expected);
            assert!(disconnect.error.is_none());
            assert!(disconnect.close.unwrap().is_normal());
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(session.state(), ConnectivityState::Disconnected);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_server_close_reports_code_and_reason() {
    let (endpoint, _observed) = serve_once(Some((4000, "bye"))).await;
    let (session, mut events) = session_for(&RealtimeClientConfig::new(endpoint));

    session.start().unwrap();
    session.wait_until_connected(WAIT).await.unwrap();
    assert!(matches!(next_event(&mut events).await, SessionEvent::Server(_)));

    session.commit_audio().await.unwrap();
    match next_event(&mut events).await {
        SessionEvent::Disconnected(disconnect) => {
            assert!(!disconnect.expected);
            assert_eq!(disconnect.close, Some(CloseReason::new(4000, "bye")));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(session.state(), ConnectivityState::Disconnected);
}

#[tokio::test]
async fn test_refused_connection_is_a_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (session, mut events) = session_for(&RealtimeClientConfig::new(format!("ws://{addr}")));
    session.start().unwrap();
    match next_event(&mut events).await {
        SessionEvent::Disconnected(disconnect) => {
            assert!(disconnect.is_error());
            assert!(disconnect.close.is_none());
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(session.state(), ConnectivityState::Disconnected);
    assert!(session.wait_until_connected(Duration::from_millis(50)).await.is_err());
}
