//! WebSocket transport backed by `tokio-tungstenite`.

use super::{CloseReason, ConnectRequest, Transport, TransportHandle, TransportListener};
use crate::config::RealtimeClientConfig;
use crate::error::{RealtimeError, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Opens realtime connections over WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    endpoint: String,
    api_key: Option<SecretString>,
    headers: Vec<(String, String)>,
}

impl WebSocketTransport {
    /// Create a transport from client settings.
    pub fn new(config: &RealtimeClientConfig) -> Result<Self> {
        let endpoint = config.endpoint_url()?.to_string();
        Ok(Self { endpoint, api_key: config.api_key.clone(), headers: config.headers.clone() })
    }

    /// Create a transport from `AIWIRE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(&RealtimeClientConfig::from_env()?)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn auth_token(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    async fn open(
        &self,
        request: ConnectRequest,
        listener: Arc<dyn TransportListener>,
    ) -> Result<()> {
        let mut http_request = request.url.as_str().into_client_request().map_err(|e| {
            RealtimeError::connection(format!("Failed to create client request: {e}"))
        })?;

        let headers = http_request.headers_mut();
        if let Some(token) = &request.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| RealtimeError::connection(format!("Invalid auth token header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RealtimeError::connection(format!("Invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RealtimeError::connection(format!("Invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        let (stream, _response) =
            tokio::time::timeout(request.connect_timeout, connect_async(http_request))
                .await
                .map_err(|_| {
                    RealtimeError::timeout(format!(
                        "WebSocket handshake did not finish within {:?}",
                        request.connect_timeout
                    ))
                })?
                .map_err(|e| RealtimeError::connection(format!("WebSocket connect error: {e}")))?;

        tracing::debug!(endpoint = %request.url, "WebSocket connected");

        let (mut sink, mut source) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

        let writer = tokio::spawn(async move {
            while let Some(outbound) = rx.recv().await {
                match outbound {
                    Outbound::Text(text) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            tracing::warn!(error = %e, "WebSocket write failed");
                            break;
                        }
                    }
                    Outbound::Close(reason) => {
                        let frame =
                            CloseFrame { code: CloseCode::from(reason.code), reason: reason.reason.into() };
                        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                            tracing::debug!(error = %e, "WebSocket close frame not sent");
                        }
                        break;
                    }
                }
            }
        });

        listener.on_open(Arc::new(WebSocketHandle { tx })).await;

        // A close frame from the peer is followed by the end of the stream once tungstenite
        // has answered it; errors after that point are part of the shutdown.
        let mut peer_close: Option<CloseReason> = None;
        let outcome = loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => listener.on_message(text.as_str().to_owned()).await,
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => listener.on_message(text).await,
                    Err(e) => tracing::warn!(error = %e, "Dropping non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| CloseReason::new(u16::from(f.code), f.reason.as_str()))
                        .unwrap_or_else(|| CloseReason::new(CloseReason::NO_STATUS, ""));
                    tracing::debug!(%reason, "WebSocket close frame received");
                    peer_close = Some(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => match peer_close.take() {
                    Some(reason) => break Ok(reason),
                    None => break Err(RealtimeError::transport(format!("Receive error: {e}"))),
                },
                None => break Ok(peer_close.take().unwrap_or_else(CloseReason::abnormal)),
            }
        };

        writer.abort();
        match outcome {
            Ok(reason) => listener.on_closed(reason).await,
            Err(error) => listener.on_failure(error).await,
        }
        Ok(())
    }
}

enum Outbound {
    Text(String),
    Close(CloseReason),
}

/// Write side of a [`WebSocketTransport`] connection.
///
/// Frames go through a channel to the connection's writer task, so the handle can be used
/// from any thread or runtime.
struct WebSocketHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

#[async_trait]
impl TransportHandle for WebSocketHandle {
    async fn send_text(&self, text: String) -> Result<()> {
        self.tx
            .send(Outbound::Text(text))
            .map_err(|_| RealtimeError::transport("WebSocket writer has stopped"))
    }

    async fn close(&self, reason: CloseReason) -> Result<()> {
        self.tx
            .send(Outbound::Close(reason))
            .map_err(|_| RealtimeError::transport("WebSocket writer has stopped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_includes_model() {
        let config = RealtimeClientConfig::new("wss://example.invalid/v1/realtime")
            .with_model("voice-1")
            .with_api_key("sk-test");
        let transport = WebSocketTransport::new(&config).unwrap();
        assert_eq!(transport.endpoint(), "wss://example.invalid/v1/realtime?model=voice-1");
        assert_eq!(transport.auth_token().unwrap().expose_secret(), "sk-test");
    }

    #[test]
    fn test_rejects_http_endpoint() {
        let config = RealtimeClientConfig::new("https://example.invalid");
        assert!(matches!(WebSocketTransport::new(&config), Err(RealtimeError::ConfigError(_))));
    }
}
