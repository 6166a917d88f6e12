//! Span helpers for realtime operations
//!
//! Provides pre-configured spans for instrumenting session lifecycle and frame handling.

use tracing::Span;

/// Create a span covering the lifetime of a realtime session
///
/// # Arguments
/// * `session_id` - Locally generated session identifier
/// * `endpoint` - Endpoint the session connects to
///
/// # Example
/// ```
/// use aiwire_telemetry::realtime_session_span;
/// let span = realtime_session_span("sess-123", "wss://example.invalid/realtime");
/// let _enter = span.enter();
/// ```
pub fn realtime_session_span(session_id: &str, endpoint: &str) -> Span {
    tracing::info_span!(
        "realtime.session",
        session.id = session_id,
        realtime.endpoint = endpoint,
        otel.kind = "client"
    )
}

/// Create a span for one outbound connect attempt
pub fn realtime_connect_span(session_id: &str, attempt: u32) -> Span {
    tracing::info_span!("realtime.connect", session.id = session_id, connect.attempt = attempt)
}

/// Create a span for handling a single frame
///
/// `direction` is `"inbound"` or `"outbound"`. The event type is recorded later via
/// [`record_event_type`] once the frame has been decoded.
pub fn realtime_frame_span(session_id: &str, direction: &'static str) -> Span {
    tracing::debug_span!(
        "realtime.frame",
        session.id = session_id,
        frame.direction = direction,
        event.kind = tracing::field::Empty,
    )
}

/// Record the decoded event type on a frame span
pub fn record_event_type(span: &Span, event_type: &str) {
    span.record("event.kind", event_type);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_helpers_do_not_panic_without_subscriber() {
        let session = realtime_session_span("s1", "wss://example.invalid");
        let _enter = session.enter();
        let _connect = realtime_connect_span("s1", 1);
        let frame = realtime_frame_span("s1", "inbound");
        record_event_type(&frame, "session.created");
    }
}
