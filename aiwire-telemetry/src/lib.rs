//! # aiwire Telemetry
//!
//! Structured logging for the aiwire SDK.
//!
//! ## Features
//! - Console logging with `tracing`, filtered through `RUST_LOG`
//! - JSON output for log shippers
//! - Span helpers for realtime session, connect and frame handling
//!
//! ## Usage
//!
//! ```rust
//! use aiwire_telemetry::{init_telemetry, info};
//!
//! fn main() -> Result<(), aiwire_telemetry::InitError> {
//!     init_telemetry("voice-gateway")?;
//!     info!("ready");
//!     Ok(())
//! }
//! ```

pub mod init;
pub mod spans;

// Re-export tracing macros for convenience
pub use tracing::{Span, debug, error, info, instrument, trace, warn};

// Re-export span helpers
pub use spans::*;

// Re-export init functions
pub use init::{
    DEFAULT_FILTER, InitError, LogFormat, init_json_telemetry, init_telemetry, init_with_format,
    is_initialized,
};
