//! Error types for the realtime module.

use crate::state::ConnectivityState;
use thiserror::Error;

/// Result type for realtime operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Errors that can occur during realtime operations.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// The operation is not legal in the session's current state.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        /// Rejected operation (`start`, `send`, `stop`, ...).
        operation: &'static str,
        /// State observed when the operation was rejected.
        state: ConnectivityState,
    },

    /// Session was closed and can no longer be used.
    #[error("Session already closed")]
    SessionClosed,

    /// No live transport handle is available.
    #[error("Session not connected")]
    NotConnected,

    /// WebSocket connection error.
    #[error("WebSocket connection error: {0}")]
    ConnectionError(String),

    /// Transport-level I/O failure after the connection was established.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An outbound event could not be encoded.
    #[error("Failed to encode {event_type}: {message}")]
    Encode {
        /// Discriminator of the event that failed to encode.
        event_type: String,
        /// Underlying serializer message.
        message: String,
    },

    /// An inbound frame could not be decoded.
    #[error("Failed to decode frame{}: {message}", event_type.as_deref().map(|t| format!(" of type '{t}'")).unwrap_or_default())]
    Decode {
        /// Discriminator of the frame, when one could be read.
        event_type: Option<String>,
        /// Underlying parser message.
        message: String,
    },

    /// Server returned an error.
    #[error("Server error: {code} - {message}")]
    ServerError {
        /// Error code from the server.
        code: String,
        /// Error message from the server.
        message: String,
    },

    /// Timeout waiting for a condition.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RealtimeError {
    /// Create a new connection error.
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a new transport error.
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new server error.
    pub fn server<S: Into<String>>(code: S, message: S) -> Self {
        Self::ServerError { code: code.into(), message: message.into() }
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new invalid-state error.
    pub fn invalid_state(operation: &'static str, state: ConnectivityState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create a new encode error.
    pub fn encode<S: Into<String>>(event_type: S, message: impl std::fmt::Display) -> Self {
        Self::Encode { event_type: event_type.into(), message: message.to_string() }
    }

    /// Create a new decode error.
    pub fn decode(event_type: Option<&str>, message: impl std::fmt::Display) -> Self {
        Self::Decode { event_type: event_type.map(str::to_string), message: message.to_string() }
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Whether the session can still be used after this error.
    ///
    /// Only [`RealtimeError::SessionClosed`] is terminal; connection and transport
    /// failures are recovered by calling `start()` again.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::SessionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_display() {
        let err = RealtimeError::invalid_state("send", ConnectivityState::Connecting);
        assert_eq!(err.to_string(), "Cannot send while session is CONNECTING");
    }

    #[test]
    fn test_decode_display_with_and_without_type() {
        let typed = RealtimeError::decode(Some("response.done"), "missing field `response`");
        assert_eq!(
            typed.to_string(),
            "Failed to decode frame of type 'response.done': missing field `response`"
        );

        let untyped = RealtimeError::decode(None, "expected value at line 1 column 1");
        assert_eq!(untyped.to_string(), "Failed to decode frame: expected value at line 1 column 1");
    }

    #[test]
    fn test_only_closed_is_terminal() {
        assert!(!RealtimeError::SessionClosed.is_recoverable());
        assert!(RealtimeError::NotConnected.is_recoverable());
        assert!(RealtimeError::connection("dns").is_recoverable());
        assert!(
            RealtimeError::invalid_state("stop", ConnectivityState::Stopped).is_recoverable()
        );
    }
}
