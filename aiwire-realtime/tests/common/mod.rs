//! Shared test utilities: a scripted in-memory transport.

#![allow(dead_code)]

use aiwire_realtime::{
    ChannelEventHandler, CloseReason, ConnectRequest, RealtimeError, RealtimeSession, Result,
    SessionEvent, Transport, TransportHandle, TransportListener,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

pub const MOCK_ENDPOINT: &str = "wss://mock.invalid/v1/realtime";

/// What the mock does when the session opens a connection.
#[derive(Debug, Clone)]
pub enum OpenBehavior {
    /// Complete the handshake immediately.
    Accept,
    /// Fail the connect with this message.
    Reject(&'static str),
    /// Keep the connect pending until [`MockTransport::accept`] is called.
    Hold,
}

#[derive(Default)]
struct Shared {
    listener: Mutex<Option<Arc<dyn TransportListener>>>,
    sent: Mutex<Vec<String>>,
    requests: Mutex<Vec<ConnectRequest>>,
    opens: AtomicUsize,
    handle_closes: AtomicUsize,
    echo_close: AtomicBool,
}

/// In-memory transport driven by the test.
///
/// Every connection shares one outbox, so `sent()` lists frames across reconnects.
pub struct MockTransport {
    default: OpenBehavior,
    script: Mutex<VecDeque<OpenBehavior>>,
    token: SecretString,
    shared: Arc<Shared>,
}

impl MockTransport {
    pub fn new(default: OpenBehavior) -> Arc<Self> {
        Arc::new(Self {
            default,
            script: Mutex::new(VecDeque::new()),
            token: SecretString::from("sk-mock"),
            shared: Arc::new(Shared::default()),
        })
    }

    /// Behaviours for the next opens, before falling back to the default.
    pub fn scripted(default: OpenBehavior, script: Vec<OpenBehavior>) -> Arc<Self> {
        let transport = Self::new(default);
        *transport.script.lock() = script.into();
        transport
    }

    /// Answer `close()` on a handle with an immediate `on_closed`, like a peer completing
    /// the close handshake.
    pub fn echo_close(&self, enabled: bool) {
        self.shared.echo_close.store(enabled, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.shared.sent.lock().clone()
    }

    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent().iter().map(|s| serde_json::from_str(s).unwrap()).collect()
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn handle_closes(&self) -> usize {
        self.shared.handle_closes.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.shared.requests.lock().clone()
    }

    fn listener(&self) -> Arc<dyn TransportListener> {
        self.shared.listener.lock().clone().expect("no connection has been opened")
    }

    /// Wait until `opens()` reaches `count`.
    pub async fn wait_for_opens(&self, count: usize) {
        for _ in 0..200 {
            if self.opens() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} opens, saw {}", self.opens());
    }

    /// Complete a held handshake.
    pub async fn accept(&self) {
        let handle = MockHandle { shared: self.shared.clone() };
        self.listener().on_open(Arc::new(handle)).await;
    }

    /// Deliver an inbound text frame.
    pub async fn deliver(&self, text: impl Into<String>) {
        self.listener().on_message(text.into()).await;
    }

    pub async fn deliver_json(&self, value: serde_json::Value) {
        self.deliver(value.to_string()).await;
    }

    /// Report a transport failure.
    pub async fn fail(&self, message: &str) {
        self.listener().on_failure(RealtimeError::transport(message)).await;
    }

    /// Report a close initiated by the peer.
    pub async fn peer_close(&self, reason: CloseReason) {
        self.listener().on_closed(reason).await;
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn endpoint(&self) -> &str {
        MOCK_ENDPOINT
    }

    fn auth_token(&self) -> Option<&SecretString> {
        Some(&self.token)
    }

    async fn open(
        &self,
        request: ConnectRequest,
        listener: Arc<dyn TransportListener>,
    ) -> Result<()> {
        self.shared.requests.lock().push(request);
        let behavior = self.script.lock().pop_front().unwrap_or_else(|| self.default.clone());
        let result = match behavior {
            OpenBehavior::Reject(message) => Err(RealtimeError::connection(message)),
            OpenBehavior::Accept => {
                *self.shared.listener.lock() = Some(listener.clone());
                let handle = MockHandle { shared: self.shared.clone() };
                listener.on_open(Arc::new(handle)).await;
                Ok(())
            }
            OpenBehavior::Hold => {
                *self.shared.listener.lock() = Some(listener);
                Ok(())
            }
        };
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        result
    }
}

struct MockHandle {
    shared: Arc<Shared>,
}

#[async_trait]
impl TransportHandle for MockHandle {
    async fn send_text(&self, text: String) -> Result<()> {
        self.shared.sent.lock().push(text);
        Ok(())
    }

    async fn close(&self, reason: CloseReason) -> Result<()> {
        self.shared.handle_closes.fetch_add(1, Ordering::SeqCst);
        if self.shared.echo_close.load(Ordering::SeqCst) {
            let listener = self.shared.listener.lock().clone();
            if let Some(listener) = listener {
                listener.on_closed(reason).await;
            }
        }
        Ok(())
    }
}

/// A session over `transport` with a channel handler.
pub fn session_with(
    transport: Arc<MockTransport>,
) -> (RealtimeSession, mpsc::UnboundedReceiver<SessionEvent>) {
    let (handler, events) = ChannelEventHandler::new();
    let session = RealtimeSession::builder()
        .transport(transport)
        .handler(Arc::new(handler))
        .build()
        .expect("session builds");
    (session, events)
}

/// Next event from the handler channel, failing the test after one second.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("handler channel closed")
}
