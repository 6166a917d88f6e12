//! # aiwire-realtime
//!
//! Full-duplex realtime event client for the aiwire SDK.
//!
//! A [`RealtimeSession`] owns one persistent connection to a realtime endpoint. Client
//! events (session updates, audio, conversation items, response control) go out with
//! [`RealtimeSession::send`]; server events (deltas, transcripts, function calls, errors)
//! are decoded and delivered, in wire order, to a [`ServerEventHandler`].
//!
//! ## Architecture
//!
//! ```text
//!   caller ── start/send/stop/close ──► RealtimeSession ──► TransportHandle ──► socket
//!                                          │   ▲
//!                          state machine ──┘   │ on_open / on_message / on_closed / on_failure
//!                                              │
//!   ServerEventHandler ◄── EventCodec::decode ─┴──────────── Transport (I/O task)
//! ```
//!
//! - **Events**: flat tagged enums [`ClientEvent`] / [`ServerEvent`], one variant per kind.
//! - **Codec**: [`EventCodec`], a registry from `type` to decoder with an `Unknown` fallback.
//! - **State**: [`ConnectivityState`], changed only by compare-and-swap.
//! - **Transport**: the [`Transport`] capability; [`WebSocketTransport`] with the default
//!   `websocket` feature.
//!
//! ## Example
//!
//! ```rust,ignore
//! use aiwire_realtime::{
//!     FnEventHandler, RealtimeClientConfig, RealtimeSession, ServerEvent, SessionConfig,
//!     WebSocketTransport,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> aiwire_realtime::Result<()> {
//!     let config = RealtimeClientConfig::from_env()?;
//!     let handler = FnEventHandler::new(|event| {
//!         if let ServerEvent::TextDelta(delta) = event {
//!             print!("{}", delta.delta);
//!         }
//!     });
//!
//!     let session = RealtimeSession::builder()
//!         .transport(Arc::new(WebSocketTransport::new(&config)?))
//!         .handler(Arc::new(handler))
//!         .build()?;
//!
//!     session.start()?;
//!     session.wait_until_connected(Duration::from_secs(10)).await?;
//!     session.update_session(SessionConfig::new().with_instructions("Be brief.")).await?;
//!     session.send_text("Hello!").await?;
//!     session.create_response().await?;
//!
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     session.close().await
//! }
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod handler;
pub mod reconnect;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports
pub use audio::{AudioChunk, AudioEncoding, AudioFormat};
pub use codec::{DecodeFn, EventCodec};
pub use config::{RealtimeClientConfig, SessionConfig, ToolDefinition, TurnDetection, VadMode};
pub use envelope::{ApiError, ApiResponse, StreamingApiResponse};
pub use error::{RealtimeError, Result};
pub use events::{ClientEvent, RawClientEvent, ServerEvent, UnknownEvent};
pub use handler::{
    ChannelEventHandler, Disconnect, FnEventHandler, NoOpEventHandler, ServerEventHandler,
    SessionEvent,
};
pub use reconnect::{ReconnectPolicy, reconnect};
pub use session::{RealtimeSession, RealtimeSessionBuilder};
pub use state::{AtomicConnectivityState, ConnectivityState};
pub use transport::{CloseReason, ConnectRequest, Transport, TransportHandle, TransportListener};

#[cfg(feature = "websocket")]
pub use transport::WebSocketTransport;
