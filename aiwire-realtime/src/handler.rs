//! Handlers for events delivered by a [`RealtimeSession`](crate::RealtimeSession).

use crate::error::RealtimeError;
use crate::events::ServerEvent;
use crate::transport::CloseReason;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Why a connection ended.
///
/// Delivered once per connection that reached the transport, whether it ended cleanly or
/// not.
#[derive(Debug)]
pub struct Disconnect {
    /// Close code and reason, when the connection ended with a close handshake.
    pub close: Option<CloseReason>,
    /// Transport or connect failure, when there was one.
    pub error: Option<RealtimeError>,
    /// True when the disconnect follows a call to `stop()`.
    pub expected: bool,
}

impl Disconnect {
    /// A connection that ended with a close handshake.
    pub fn closed(reason: CloseReason, expected: bool) -> Self {
        Self { close: Some(reason), error: None, expected }
    }

    /// A connection that failed.
    pub fn failed(error: RealtimeError, expected: bool) -> Self {
        Self { close: None, error: Some(error), expected }
    }

    /// Whether the connection ended with an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Receives decoded server events from a session.
///
/// Methods are awaited one at a time, in wire order; a slow handler delays the next event.
/// Handlers must not block the thread.
#[async_trait]
pub trait ServerEventHandler: Send + Sync {
    /// Called for every decoded server event.
    async fn on_event(&self, event: ServerEvent);

    /// Called when an inbound frame could not be decoded. The session keeps running.
    async fn on_decode_error(&self, _error: &RealtimeError, _raw: &str) {}

    /// Called when the connection ends.
    async fn on_disconnect(&self, _disconnect: Disconnect) {}
}

/// Handler that ignores everything.
#[derive(Debug, Clone, Default)]
pub struct NoOpEventHandler;

#[async_trait]
impl ServerEventHandler for NoOpEventHandler {
    async fn on_event(&self, _event: ServerEvent) {}
}

/// A closure-based handler for server events.
pub struct FnEventHandler<F>
where
    F: Fn(ServerEvent) + Send + Sync,
{
    handler: F,
}

impl<F> FnEventHandler<F>
where
    F: Fn(ServerEvent) + Send + Sync,
{
    /// Create a new closure-based handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> ServerEventHandler for FnEventHandler<F>
where
    F: Fn(ServerEvent) + Send + Sync,
{
    async fn on_event(&self, event: ServerEvent) {
        (self.handler)(event)
    }
}

/// Everything a [`ChannelEventHandler`] forwards.
#[derive(Debug)]
pub enum SessionEvent {
    /// A decoded server event.
    Server(ServerEvent),
    /// A frame that failed to decode.
    DecodeError {
        /// Decoder message.
        message: String,
        /// The frame as received.
        raw: String,
    },
    /// The connection ended.
    Disconnected(Disconnect),
}

/// Forwards everything into an unbounded channel for pull-style consumption.
#[derive(Debug, Clone)]
pub struct ChannelEventHandler {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelEventHandler {
    /// Create a handler and the receiver it feeds.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("session event receiver dropped");
        }
    }
}

#[async_trait]
impl ServerEventHandler for ChannelEventHandler {
    async fn on_event(&self, event: ServerEvent) {
        self.forward(SessionEvent::Server(event));
    }

    async fn on_decode_error(&self, error: &RealtimeError, raw: &str) {
        self.forward(SessionEvent::DecodeError { message: error.to_string(), raw: raw.to_string() });
    }

    async fn on_disconnect(&self, disconnect: Disconnect) {
        self.forward(SessionEvent::Disconnected(disconnect));
    }
}
