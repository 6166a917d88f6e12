//! Result envelopes of the SDK's non-realtime (REST) services.
//!
//! The realtime session does not use these. They describe the boundary callers of the
//! REST services see: one uniform result for plain calls, and the same metadata plus a
//! single-subscription chunk stream for streaming calls. No HTTP client lives here.

use crate::error::{RealtimeError, Result};
use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

/// Stream of chunks of a streaming REST call.
pub type ChunkStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

/// Error object of a failed REST call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Provider error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Result of a plain REST call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Status code.
    pub code: i32,
    /// Human-readable status message.
    pub msg: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Payload of a successful call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error of a failed call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// A successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self { code: 200, msg: "success".to_string(), success: true, data: Some(data), error: None }
    }

    /// A failed response.
    pub fn failure(code: i32, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            code,
            msg: msg.clone(),
            success: false,
            data: None,
            error: Some(ApiError { code: code.to_string(), message: msg }),
        }
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.success && self.error.is_none()
    }

    /// The payload, or the call's error as a [`RealtimeError::ServerError`].
    pub fn into_result(self) -> Result<T> {
        if !self.is_success() {
            let (code, message) = match self.error {
                Some(error) => (error.code, error.message),
                None => (self.code.to_string(), self.msg),
            };
            return Err(RealtimeError::ServerError { code, message });
        }
        self.data.ok_or_else(|| RealtimeError::server(self.code.to_string(), "response has no data".into()))
    }
}

/// Result of a streaming REST call.
///
/// The chunk stream can be taken once; it is lazy and yields nothing until polled.
pub struct StreamingApiResponse<T> {
    /// Status code.
    pub code: i32,
    /// Human-readable status message.
    pub msg: String,
    /// Whether the call was accepted.
    pub success: bool,
    /// Error of a rejected call.
    pub error: Option<ApiError>,
    stream: Mutex<Option<ChunkStream<T>>>,
}

impl<T> StreamingApiResponse<T> {
    /// An accepted call whose chunks come from `stream`.
    pub fn ok(stream: ChunkStream<T>) -> Self {
        Self {
            code: 200,
            msg: "success".to_string(),
            success: true,
            error: None,
            stream: Mutex::new(Some(stream)),
        }
    }

    /// A rejected call; it has no chunks.
    pub fn failure(code: i32, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            code,
            msg: msg.clone(),
            success: false,
            error: Some(ApiError { code: code.to_string(), message: msg }),
            stream: Mutex::new(None),
        }
    }

    /// Whether the call was accepted.
    pub fn is_success(&self) -> bool {
        self.success && self.error.is_none()
    }

    /// Take the chunk stream. Returns `Some` at most once.
    pub fn take_stream(&self) -> Option<ChunkStream<T>> {
        self.stream.lock().take()
    }
}

impl<T> fmt::Debug for StreamingApiResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingApiResponse")
            .field("code", &self.code)
            .field("msg", &self.msg)
            .field("success", &self.success)
            .field("error", &self.error)
            .field("stream_taken", &self.stream.lock().is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_into_result() {
        assert_eq!(ApiResponse::ok(7).into_result().unwrap(), 7);

        let err = ApiResponse::<u32>::failure(429, "slow down").into_result().unwrap_err();
        assert_eq!(err.to_string(), "Server error: 429 - slow down");
    }

    #[test]
    fn test_envelope_wire_shape() {
        let json = serde_json::to_value(ApiResponse::ok("x")).unwrap();
        assert_eq!(json, serde_json::json!({"code": 200, "msg": "success", "success": true, "data": "x"}));
    }

    #[tokio::test]
    async fn test_stream_is_single_subscription() {
        let chunks = futures::stream::iter(vec![Ok::<u32, RealtimeError>(1), Ok(2)]);
        let response: StreamingApiResponse<u32> = StreamingApiResponse::ok(Box::pin(chunks));

        let stream = response.take_stream().unwrap();
        assert!(response.take_stream().is_none());
        let collected: Vec<u32> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(collected, vec![1, 2]);
    }

    #[test]
    fn test_failed_stream_has_no_chunks() {
        let response = StreamingApiResponse::<u32>::failure(500, "boom");
        assert!(!response.is_success());
        assert!(response.take_stream().is_none());
    }
}
