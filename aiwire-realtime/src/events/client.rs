//! Client → server events.

use super::ConversationItem;
use crate::audio::{AudioEncoding, base64_bytes};
use crate::config::{MaxOutputTokens, SessionConfig, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

tagged_events! {
    /// Events sent from the client to the realtime server.
    pub enum ClientEvent {
        fallback {
            /// An event kind not modelled above, sent as-is.
            Raw(RawClientEvent)
        }
        /// Update session configuration.
        "session.update" => SessionUpdate(SessionUpdateEvent),
        /// Append audio to the input buffer.
        "input_audio_buffer.append" => InputAudioBufferAppend(InputAudioBufferAppendEvent),
        /// Commit the input buffer as a user message.
        "input_audio_buffer.commit" => InputAudioBufferCommit(InputAudioBufferCommitEvent),
        /// Discard the input buffer.
        "input_audio_buffer.clear" => InputAudioBufferClear(InputAudioBufferClearEvent),
        /// Add an item to the conversation.
        "conversation.item.create" => ConversationItemCreate(ConversationItemCreateEvent),
        /// Remove an item from the conversation.
        "conversation.item.delete" => ConversationItemDelete(ConversationItemDeleteEvent),
        /// Truncate a previous assistant audio message.
        "conversation.item.truncate" => ConversationItemTruncate(ConversationItemTruncateEvent),
        /// Ask the server for an item's current state.
        "conversation.item.retrieve" => ConversationItemRetrieve(ConversationItemRetrieveEvent),
        /// Trigger a response from the model.
        "response.create" => ResponseCreate(ResponseCreateEvent),
        /// Cancel the in-progress response.
        "response.cancel" => ResponseCancel(ResponseCancelEvent),
    }
}

/// `session.update`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdateEvent {
    /// Optional client-assigned event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Fields of the session to change.
    pub session: SessionConfig,
}

/// `input_audio_buffer.append`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputAudioBufferAppendEvent {
    /// Optional client-assigned event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Audio bytes in the session's input format.
    #[serde(with = "base64_bytes")]
    pub audio: Vec<u8>,
}

/// `input_audio_buffer.commit`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputAudioBufferCommitEvent {
    /// Optional client-assigned event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
}

/// `input_audio_buffer.clear`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputAudioBufferClearEvent {
    /// Optional client-assigned event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
}

/// `conversation.item.create`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItemCreateEvent {
    /// Optional client-assigned event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Insert after this item; appended to the end when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_item_id: Option<String>,
    /// The item to add.
    pub item: ConversationItem,
}

/// `conversation.item.delete`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItemDeleteEvent {
    /// Optional client-assigned event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Item to delete.
    pub item_id: String,
}

/// `conversation.item.truncate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItemTruncateEvent {
    /// Optional client-assigned event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Assistant message item to truncate.
    pub item_id: String,
    /// Content part to truncate.
    pub content_index: u32,
    /// Audio played so far; everything after is dropped.
    pub audio_end_ms: u64,
}

/// `conversation.item.retrieve`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItemRetrieveEvent {
    /// Optional client-assigned event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Item to retrieve.
    pub item_id: String,
}

/// Per-response overrides for `response.create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseOptions {
    /// Output modalities for this response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    /// Instructions for this response only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Voice for this response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Output audio format for this response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<AudioEncoding>,
    /// Tools for this response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool selection mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Output token limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<MaxOutputTokens>,
    /// `"auto"` (default conversation) or `"none"` (out-of-band response).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    /// Arbitrary caller metadata echoed on the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// `response.create`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseCreateEvent {
    /// Optional client-assigned event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Overrides for this response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseOptions>,
}

/// `response.cancel`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseCancelEvent {
    /// Optional client-assigned event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Response to cancel; the in-progress one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

/// A client event of a kind this crate does not model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawClientEvent {
    /// Discriminator sent as `type`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Optional client-assigned event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Remaining top-level fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl RawClientEvent {
    /// Create a raw event with no payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self { event_type: event_type.into(), ..Default::default() }
    }

    /// Add a top-level field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}

impl ClientEvent {
    /// `session.update` with the given configuration.
    pub fn session_update(session: SessionConfig) -> Self {
        SessionUpdateEvent { event_id: String::new(), session }.into()
    }

    /// `input_audio_buffer.append` with raw audio bytes.
    pub fn append_audio(audio: impl Into<Vec<u8>>) -> Self {
        InputAudioBufferAppendEvent { event_id: String::new(), audio: audio.into() }.into()
    }

    /// `input_audio_buffer.commit`.
    pub fn commit_audio() -> Self {
        InputAudioBufferCommitEvent::default().into()
    }

    /// `input_audio_buffer.clear`.
    pub fn clear_audio() -> Self {
        InputAudioBufferClearEvent::default().into()
    }

    /// `conversation.item.create` for an arbitrary item.
    pub fn create_item(item: ConversationItem) -> Self {
        ConversationItemCreateEvent { item, ..Default::default() }.into()
    }

    /// `conversation.item.create` with a user text message.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::create_item(ConversationItem::user_text(text))
    }

    /// `conversation.item.create` with a function call result.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::create_item(ConversationItem::function_call_output(call_id, output))
    }

    /// `conversation.item.delete`.
    pub fn delete_item(item_id: impl Into<String>) -> Self {
        ConversationItemDeleteEvent { event_id: String::new(), item_id: item_id.into() }.into()
    }

    /// `conversation.item.truncate`.
    pub fn truncate_item(item_id: impl Into<String>, content_index: u32, audio_end_ms: u64) -> Self {
        ConversationItemTruncateEvent {
            event_id: String::new(),
            item_id: item_id.into(),
            content_index,
            audio_end_ms,
        }
        .into()
    }

    /// `response.create` with session defaults.
    pub fn create_response() -> Self {
        ResponseCreateEvent::default().into()
    }

    /// `response.cancel` for the in-progress response.
    pub fn cancel_response() -> Self {
        ResponseCancelEvent::default().into()
    }

    /// Set the client-assigned event id.
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        let event_id = event_id.into();
        match &mut self {
            Self::SessionUpdate(e) => e.event_id = event_id,
            Self::InputAudioBufferAppend(e) => e.event_id = event_id,
            Self::InputAudioBufferCommit(e) => e.event_id = event_id,
            Self::InputAudioBufferClear(e) => e.event_id = event_id,
            Self::ConversationItemCreate(e) => e.event_id = event_id,
            Self::ConversationItemDelete(e) => e.event_id = event_id,
            Self::ConversationItemTruncate(e) => e.event_id = event_id,
            Self::ConversationItemRetrieve(e) => e.event_id = event_id,
            Self::ResponseCreate(e) => e.event_id = event_id,
            Self::ResponseCancel(e) => e.event_id = event_id,
            Self::Raw(e) => e.event_id = event_id,
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_is_written_first() {
        let json = serde_json::to_string(&ClientEvent::commit_audio()).unwrap();
        assert_eq!(json, r#"{"type":"input_audio_buffer.commit"}"#);
    }

    #[test]
    fn test_append_audio_is_base64_on_the_wire() {
        let event = ClientEvent::append_audio(b"hello".to_vec()).with_event_id("evt_1");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "input_audio_buffer.append", "event_id": "evt_1", "audio": "aGVsbG8="})
        );
    }

    #[test]
    fn test_function_call_output_item() {
        let value = serde_json::to_value(ClientEvent::function_call_output("call_1", "{\"ok\":true}"))
            .unwrap();
        assert_eq!(value["type"], "conversation.item.create");
        assert_eq!(value["item"]["type"], "function_call_output");
        assert_eq!(value["item"]["call_id"], "call_1");
        assert!(value["item"].get("role").is_none());
    }

    #[test]
    fn test_raw_event_carries_its_own_type() {
        let event: ClientEvent = RawClientEvent::new("input_audio_buffer.append_video_frame")
            .with_field("video_frame", json!("AAAA"))
            .into();
        assert_eq!(event.event_type(), "input_audio_buffer.append_video_frame");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "input_audio_buffer.append_video_frame", "video_frame": "AAAA"})
        );
    }

    #[test]
    fn test_payload_type_constants_match_event_type() {
        assert_eq!(ClientEvent::create_response().event_type(), ResponseCreateEvent::TYPE);
        assert_eq!(ClientEvent::delete_item("i").event_type(), "conversation.item.delete");
        assert_eq!(ClientEvent::KNOWN_TYPES.len(), 10);
    }
}
