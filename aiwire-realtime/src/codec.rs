//! Wire codec: events to JSON text and back.
//!
//! Decoding is driven by a registry keyed by the frame's `type`. Adding a new server event
//! kind means registering one more decoder; frames whose type has no decoder still decode,
//! as [`ServerEvent::Unknown`].

use crate::error::{RealtimeError, Result};
use crate::events::{ClientEvent, RawClientEvent, ServerEvent, UnknownEvent};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Decodes a complete server frame (as a JSON object, `type` included) into an event.
pub type DecodeFn = Arc<dyn Fn(Value) -> serde_json::Result<ServerEvent> + Send + Sync>;

/// Encoder and discriminator-keyed decoder registry.
///
/// Cloning is cheap; decoders are shared.
#[derive(Clone)]
pub struct EventCodec {
    decoders: HashMap<String, DecodeFn>,
}

impl Default for EventCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("EventCodec").field("types", &types).finish()
    }
}

impl EventCodec {
    /// A codec that decodes every server event kind this crate models.
    pub fn new() -> Self {
        let mut codec = Self::empty();
        for (event_type, decode) in ServerEvent::builtin_decoders() {
            codec.decoders.insert(event_type.to_string(), Arc::new(decode));
        }
        codec
    }

    /// A codec with no decoders; every frame decodes to [`ServerEvent::Unknown`].
    pub fn empty() -> Self {
        Self { decoders: HashMap::new() }
    }

    /// Register (or replace) the decoder for `event_type`.
    pub fn register<F>(&mut self, event_type: impl Into<String>, decode: F) -> &mut Self
    where
        F: Fn(Value) -> serde_json::Result<ServerEvent> + Send + Sync + 'static,
    {
        self.decoders.insert(event_type.into(), Arc::new(decode));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_decoder<F>(mut self, event_type: impl Into<String>, decode: F) -> Self
    where
        F: Fn(Value) -> serde_json::Result<ServerEvent> + Send + Sync + 'static,
    {
        self.register(event_type, decode);
        self
    }

    /// Remove the decoder for `event_type`; frames of that type become `Unknown`.
    pub fn unregister(&mut self, event_type: &str) -> bool {
        self.decoders.remove(event_type).is_some()
    }

    /// Whether `event_type` has a decoder.
    pub fn is_registered(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Number of registered decoders.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Whether no decoders are registered.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Encode a client event as a text frame.
    pub fn encode(&self, event: &ClientEvent) -> Result<String> {
        serde_json::to_string(event).map_err(|e| RealtimeError::encode(event.event_type(), e))
    }

    /// Encode a server event as a text frame.
    ///
    /// Clients never send these; loopback servers and proxies do.
    pub fn encode_server(&self, event: &ServerEvent) -> Result<String> {
        serde_json::to_string(event).map_err(|e| RealtimeError::encode(event.event_type(), e))
    }

    /// Decode a server text frame.
    ///
    /// Fails only when the text is not a JSON object, or when a registered decoder rejects
    /// the payload of its own type. Anything else (no `type`, an unregistered `type`,
    /// unexpected extra fields) decodes successfully.
    pub fn decode(&self, text: &str) -> Result<ServerEvent> {
        let object = parse_object(text)?;
        let Some(event_type) = discriminator(&object) else {
            return Ok(ServerEvent::Unknown(UnknownEvent::from_object(object)));
        };
        match self.decoders.get(&event_type) {
            Some(decode) => decode(Value::Object(object))
                .map_err(|e| RealtimeError::decode(Some(&event_type), e)),
            None => Ok(ServerEvent::Unknown(UnknownEvent::from_object(object))),
        }
    }

    /// Decode a client text frame, for loopback servers and tests.
    ///
    /// Client kinds are fixed; unmodelled types decode to [`ClientEvent::Raw`].
    pub fn decode_client(&self, text: &str) -> Result<ClientEvent> {
        let object = parse_object(text)?;
        let event_type = discriminator(&object);
        let decoder = event_type.as_deref().and_then(|t| {
            ClientEvent::builtin_decoders().into_iter().find(|(known, _)| *known == t)
        });
        match decoder {
            Some((known, decode)) => {
                decode(Value::Object(object)).map_err(|e| RealtimeError::decode(Some(known), e))
            }
            None => serde_json::from_value::<RawClientEvent>(Value::Object(object))
                .map(ClientEvent::Raw)
                .map_err(|e| RealtimeError::decode(event_type.as_deref(), e)),
        }
    }
}

fn parse_object(text: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(RealtimeError::decode(
            None,
            format!("expected a JSON object, found {}", json_kind(&other)),
        )),
        Err(e) => Err(RealtimeError::decode(None, e)),
    }
}

fn discriminator(object: &Map<String, Value>) -> Option<String> {
    object.get("type").and_then(Value::as_str).map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{HeartbeatEvent, TextDeltaEvent};

    #[test]
    fn test_new_registers_every_modelled_kind() {
        let codec = EventCodec::new();
        assert_eq!(codec.len(), ServerEvent::KNOWN_TYPES.len());
        for event_type in ServerEvent::KNOWN_TYPES {
            assert!(codec.is_registered(event_type), "{event_type} not registered");
        }
    }

    #[test]
    fn test_decode_heartbeat() {
        let event = EventCodec::new().decode(r#"{"type":"heartbeat","event_id":"h1"}"#).unwrap();
        assert_eq!(event, ServerEvent::Heartbeat(HeartbeatEvent { event_id: "h1".into() }));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let text = r#"{"type":"response.text.delta","delta":"Hi","brand_new_field":[1,2]}"#;
        let event = EventCodec::new().decode(text).unwrap();
        let ServerEvent::TextDelta(TextDeltaEvent { delta, .. }) = event else {
            panic!("expected text delta, got {event:?}");
        };
        assert_eq!(delta, "Hi");
    }

    #[test]
    fn test_missing_type_is_unknown_with_empty_type() {
        let event = EventCodec::new().decode(r#"{"event_id":"e9","foo":1}"#).unwrap();
        assert_eq!(event.event_type(), "");
        assert_eq!(event.event_id(), "e9");
        assert!(!event.is_known());
    }

    #[test]
    fn test_non_object_frames_fail() {
        let codec = EventCodec::new();
        let err = codec.decode("[1,2,3]").unwrap_err();
        assert!(err.to_string().contains("expected a JSON object, found an array"));
        assert!(matches!(codec.decode("not json"), Err(RealtimeError::Decode { event_type: None, .. })));
    }

    #[test]
    fn test_invalid_payload_of_registered_type_fails_with_type() {
        let err = EventCodec::new().decode(r#"{"type":"response.text.delta","delta":5}"#).unwrap_err();
        match err {
            RealtimeError::Decode { event_type, .. } => {
                assert_eq!(event_type.as_deref(), Some("response.text.delta"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_codec_decodes_everything_as_unknown() {
        let event = EventCodec::empty().decode(r#"{"type":"heartbeat","event_id":"h"}"#).unwrap();
        assert!(matches!(event, ServerEvent::Unknown(ref u) if u.event_type == "heartbeat"));
    }

    #[test]
    fn test_custom_decoder_overrides_builtin() {
        let mut codec = EventCodec::new();
        codec.register("heartbeat", |_| Ok(HeartbeatEvent { event_id: "custom".into() }.into()));
        let event = codec.decode(r#"{"type":"heartbeat","event_id":"h"}"#).unwrap();
        assert_eq!(event.event_id(), "custom");

        assert!(codec.unregister("heartbeat"));
        assert!(!codec.is_registered("heartbeat"));
    }

    #[test]
    fn test_decode_client_raw_fallback() {
        let codec = EventCodec::new();
        let event = codec.decode_client(r#"{"type":"transcription_session.update","x":1}"#).unwrap();
        let ClientEvent::Raw(raw) = event else { panic!("expected raw event") };
        assert_eq!(raw.event_type, "transcription_session.update");
        assert_eq!(raw.payload["x"], 1);

        let commit = codec.decode_client(r#"{"type":"input_audio_buffer.commit"}"#).unwrap();
        assert_eq!(commit, ClientEvent::commit_audio());
    }
}
