//! Transport capability consumed by [`RealtimeSession`](crate::RealtimeSession).
//!
//! The session never touches sockets itself. A [`Transport`] opens one bidirectional text
//! connection per [`Transport::open`] call and reports everything that happens on it through
//! a [`TransportListener`]; the session writes through the [`TransportHandle`] it receives in
//! [`TransportListener::on_open`].

use crate::error::{RealtimeError, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[cfg(feature = "websocket")]
mod websocket;

#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

/// Close code and reason of a finished connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// WebSocket close code.
    pub code: u16,
    /// Human-readable reason, possibly empty.
    pub reason: String,
}

impl CloseReason {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// No close code was received.
    pub const NO_STATUS: u16 = 1005;
    /// The connection dropped without a close handshake.
    pub const ABNORMAL: u16 = 1006;

    /// Create a close reason.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into() }
    }

    /// `1000`, sent by `stop()` and `close()`.
    pub fn normal() -> Self {
        Self::new(Self::NORMAL, "")
    }

    /// `1006`, reported when the peer vanished.
    pub fn abnormal() -> Self {
        Self::new(Self::ABNORMAL, "")
    }

    /// Whether this is a normal closure.
    pub fn is_normal(&self) -> bool {
        self.code == Self::NORMAL
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.reason)
        }
    }
}

/// Everything a transport needs to open one connection.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Endpoint to connect to.
    pub url: Url,
    /// Bearer token sent in the `Authorization` header.
    pub auth_token: Option<SecretString>,
    /// Extra handshake headers.
    pub headers: Vec<(String, String)>,
    /// Upper bound on the opening handshake.
    pub connect_timeout: Duration,
}

impl ConnectRequest {
    /// Create a request for `endpoint`.
    pub fn new(endpoint: &str, connect_timeout: Duration) -> Result<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| RealtimeError::config(format!("invalid endpoint '{endpoint}': {e}")))?;
        Ok(Self { url, auth_token: None, headers: Vec::new(), connect_timeout })
    }

    /// Build the request a transport describes.
    pub fn for_transport(transport: &dyn Transport, connect_timeout: Duration) -> Result<Self> {
        let mut request = Self::new(transport.endpoint(), connect_timeout)?;
        request.auth_token = transport.auth_token().cloned();
        request.headers = transport.headers();
        Ok(request)
    }

    /// Set the bearer token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(SecretString::from(token.into()));
        self
    }

    /// Add a handshake header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Write side of an open connection.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Queue a text frame.
    ///
    /// Returns once the frame is handed to the transport; there is no way to retract it.
    async fn send_text(&self, text: String) -> Result<()>;

    /// Start the closing handshake.
    async fn close(&self, reason: CloseReason) -> Result<()>;
}

/// Receives connection notifications from a transport.
///
/// Callbacks for one connection are invoked sequentially, in the order things happened on
/// the wire. Implementations must not panic.
#[async_trait]
pub trait TransportListener: Send + Sync {
    /// The handshake completed.
    async fn on_open(&self, handle: Arc<dyn TransportHandle>);

    /// A text frame arrived.
    async fn on_message(&self, text: String);

    /// The connection finished with a close handshake.
    async fn on_closed(&self, reason: CloseReason);

    /// The connection failed.
    async fn on_failure(&self, error: RealtimeError);
}

/// A way of opening bidirectional text connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Endpoint URL.
    fn endpoint(&self) -> &str;

    /// Authentication token, if any.
    fn auth_token(&self) -> Option<&SecretString>;

    /// Extra handshake headers.
    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Open a connection and drive it until it finishes.
    ///
    /// Calls `on_open` once the handshake completes, then `on_message` per inbound frame and
    /// exactly one of `on_closed` / `on_failure` at the end. An `Err` returned before
    /// `on_open` is a failed connect and must not be reported through the listener as well.
    async fn open(&self, request: ConnectRequest, listener: Arc<dyn TransportListener>)
    -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    struct Fixed;

    #[async_trait]
    impl Transport for Fixed {
        fn endpoint(&self) -> &str {
            "wss://example.invalid/realtime?model=m"
        }

        fn auth_token(&self) -> Option<&SecretString> {
            None
        }

        fn headers(&self) -> Vec<(String, String)> {
            vec![("OpenAI-Beta".into(), "realtime=v1".into())]
        }

        async fn open(&self, _: ConnectRequest, _: Arc<dyn TransportListener>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::normal().to_string(), "1000");
        assert_eq!(CloseReason::new(4000, "bye").to_string(), "4000 (bye)");
        assert!(!CloseReason::abnormal().is_normal());
    }

    #[test]
    fn test_request_for_transport() {
        let request = ConnectRequest::for_transport(&Fixed, Duration::from_secs(3)).unwrap();
        assert_eq!(request.url.query(), Some("model=m"));
        assert_eq!(request.headers.len(), 1);
        assert!(request.auth_token.is_none());

        let request = request.with_auth_token("sk-test");
        assert_eq!(request.auth_token.unwrap().expose_secret(), "sk-test");
    }

    #[test]
    fn test_request_rejects_bad_url() {
        let err = ConnectRequest::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, RealtimeError::ConfigError(_)));
    }
}
