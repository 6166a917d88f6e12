//! Server → client events.

use super::{ContentPart, ConversationItem, ErrorInfo, RateLimit, ResponseObject};
use crate::audio::base64_bytes;
use crate::config::SessionConfig;
use crate::error::RealtimeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

tagged_events! {
    /// Events received from the realtime server.
    ///
    /// Server-sent deltas for one item arrive (and are delivered) in wire order; a `*.done`
    /// event always follows the deltas it terminates.
    pub enum ServerEvent {
        fallback {
            /// An event whose `type` has no registered decoder.
            Unknown(UnknownEvent)
        }
        /// Session was created; first event after connecting.
        "session.created" => SessionCreated(SessionCreatedEvent),
        /// Session configuration was updated.
        "session.updated" => SessionUpdated(SessionUpdatedEvent),
        /// Conversation was created.
        "conversation.created" => ConversationCreated(ConversationCreatedEvent),
        /// Conversation item was created.
        "conversation.item.created" => ConversationItemCreated(ConversationItemCreatedEvent),
        /// Conversation item was deleted.
        "conversation.item.deleted" => ConversationItemDeleted(ConversationItemDeletedEvent),
        /// Assistant audio item was truncated.
        "conversation.item.truncated" => ConversationItemTruncated(ConversationItemTruncatedEvent),
        /// Reply to `conversation.item.retrieve`.
        "conversation.item.retrieved" => ConversationItemRetrieved(ConversationItemRetrievedEvent),
        /// Transcription of user audio finished.
        "conversation.item.input_audio_transcription.completed" => TranscriptionCompleted(TranscriptionCompletedEvent),
        /// Transcription of user audio failed.
        "conversation.item.input_audio_transcription.failed" => TranscriptionFailed(TranscriptionFailedEvent),
        /// Audio input buffer was committed.
        "input_audio_buffer.committed" => AudioCommitted(AudioCommittedEvent),
        /// Audio input buffer was cleared.
        "input_audio_buffer.cleared" => AudioCleared(AudioClearedEvent),
        /// User speech started (VAD detected).
        "input_audio_buffer.speech_started" => SpeechStarted(SpeechStartedEvent),
        /// User speech ended (VAD detected).
        "input_audio_buffer.speech_stopped" => SpeechStopped(SpeechStoppedEvent),
        /// Response generation started.
        "response.created" => ResponseCreated(ResponseCreatedEvent),
        /// Response generation completed.
        "response.done" => ResponseDone(ResponseDoneEvent),
        /// Response output item added.
        "response.output_item.added" => OutputItemAdded(OutputItemAddedEvent),
        /// Response output item completed.
        "response.output_item.done" => OutputItemDone(OutputItemDoneEvent),
        /// Content part added to an output item.
        "response.content_part.added" => ContentPartAdded(ContentPartAddedEvent),
        /// Content part completed.
        "response.content_part.done" => ContentPartDone(ContentPartDoneEvent),
        /// Text delta.
        "response.text.delta" => TextDelta(TextDeltaEvent),
        /// Text output completed.
        "response.text.done" => TextDone(TextDoneEvent),
        /// Audio delta.
        "response.audio.delta" => AudioDelta(AudioDeltaEvent),
        /// Audio output completed.
        "response.audio.done" => AudioDone(AudioDoneEvent),
        /// Audio transcript delta.
        "response.audio_transcript.delta" => TranscriptDelta(TranscriptDeltaEvent),
        /// Audio transcript completed.
        "response.audio_transcript.done" => TranscriptDone(TranscriptDoneEvent),
        /// Function call arguments delta.
        "response.function_call_arguments.delta" => FunctionCallArgumentsDelta(FunctionCallArgumentsDeltaEvent),
        /// Function call arguments completed.
        "response.function_call_arguments.done" => FunctionCallArgumentsDone(FunctionCallArgumentsDoneEvent),
        /// Rate limits changed.
        "rate_limits.updated" => RateLimitsUpdated(RateLimitsUpdatedEvent),
        /// The server rejected a client event or hit an internal error.
        "error" => Error(ErrorEvent),
        /// Keep-alive.
        "heartbeat" => Heartbeat(HeartbeatEvent),
    }
}

impl ServerEvent {
    /// Whether this event was decoded into a dedicated variant.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// The server error carried by an `error` event.
    pub fn as_error(&self) -> Option<RealtimeError> {
        match self {
            Self::Error(event) => Some(event.to_error()),
            _ => None,
        }
    }
}

/// `session.created`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCreatedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Effective session configuration.
    pub session: SessionConfig,
}

/// `session.updated`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdatedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Effective session configuration.
    pub session: SessionConfig,
}

/// A conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id.
    pub id: String,
    /// Always `realtime.conversation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

/// `conversation.created`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationCreatedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// The new conversation.
    pub conversation: Conversation,
}

/// `conversation.item.created`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItemCreatedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Item preceding the new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_item_id: Option<String>,
    /// The created item.
    pub item: ConversationItem,
}

/// `conversation.item.deleted`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItemDeletedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Deleted item.
    pub item_id: String,
}

/// `conversation.item.truncated`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItemTruncatedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Truncated item.
    pub item_id: String,
    /// Truncated content part.
    #[serde(default)]
    pub content_index: u32,
    /// Audio kept, in milliseconds.
    #[serde(default)]
    pub audio_end_ms: u64,
}

/// `conversation.item.retrieved`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItemRetrievedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Current state of the item.
    pub item: ConversationItem,
}

/// `conversation.item.input_audio_transcription.completed`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionCompletedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// User message item.
    #[serde(default)]
    pub item_id: String,
    /// Audio content part.
    #[serde(default)]
    pub content_index: u32,
    /// Transcribed text.
    pub transcript: String,
}

/// `conversation.item.input_audio_transcription.failed`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionFailedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// User message item.
    #[serde(default)]
    pub item_id: String,
    /// Audio content part.
    #[serde(default)]
    pub content_index: u32,
    /// Failure details.
    pub error: ErrorInfo,
}

/// `input_audio_buffer.committed`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioCommittedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Item preceding the new user item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_item_id: Option<String>,
    /// User item created from the buffer.
    pub item_id: String,
}

/// `input_audio_buffer.cleared`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioClearedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
}

/// `input_audio_buffer.speech_started`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechStartedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Offset of speech start in the buffer.
    #[serde(default)]
    pub audio_start_ms: u64,
    /// User item that will be created.
    #[serde(default)]
    pub item_id: String,
}

/// `input_audio_buffer.speech_stopped`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechStoppedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Offset of speech end in the buffer.
    #[serde(default)]
    pub audio_end_ms: u64,
    /// User item that will be created.
    #[serde(default)]
    pub item_id: String,
}

/// `response.created`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseCreatedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// The response, `in_progress`.
    pub response: ResponseObject,
}

/// `response.done`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseDoneEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// The final response.
    pub response: ResponseObject,
}

/// `response.output_item.added`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputItemAddedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// The item.
    pub item: ConversationItem,
}

/// `response.output_item.done`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputItemDoneEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// The completed item.
    pub item: ConversationItem,
}

/// `response.content_part.added`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPartAddedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Owning item.
    #[serde(default)]
    pub item_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// Index of the part in the item content.
    #[serde(default)]
    pub content_index: u32,
    /// The part.
    pub part: ContentPart,
}

/// `response.content_part.done`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPartDoneEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Owning item.
    #[serde(default)]
    pub item_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// Index of the part in the item content.
    #[serde(default)]
    pub content_index: u32,
    /// The completed part.
    pub part: ContentPart,
}

/// `response.text.delta`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextDeltaEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Owning item.
    #[serde(default)]
    pub item_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// Index of the part in the item content.
    #[serde(default)]
    pub content_index: u32,
    /// Text chunk.
    pub delta: String,
}

/// `response.text.done`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextDoneEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Owning item.
    #[serde(default)]
    pub item_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// Index of the part in the item content.
    #[serde(default)]
    pub content_index: u32,
    /// Complete text.
    pub text: String,
}

/// `response.audio.delta`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioDeltaEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Owning item.
    #[serde(default)]
    pub item_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// Index of the part in the item content.
    #[serde(default)]
    pub content_index: u32,
    /// Audio bytes in the session's output format.
    #[serde(with = "base64_bytes")]
    pub delta: Vec<u8>,
}

/// `response.audio.done`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioDoneEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Owning item.
    #[serde(default)]
    pub item_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// Index of the part in the item content.
    #[serde(default)]
    pub content_index: u32,
}

/// `response.audio_transcript.delta`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptDeltaEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Owning item.
    #[serde(default)]
    pub item_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// Index of the part in the item content.
    #[serde(default)]
    pub content_index: u32,
    /// Transcript chunk.
    pub delta: String,
}

/// `response.audio_transcript.done`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptDoneEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Owning item.
    #[serde(default)]
    pub item_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// Index of the part in the item content.
    #[serde(default)]
    pub content_index: u32,
    /// Complete transcript.
    pub transcript: String,
}

/// `response.function_call_arguments.delta`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallArgumentsDeltaEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Function call item.
    #[serde(default)]
    pub item_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// Call id.
    pub call_id: String,
    /// Arguments chunk.
    pub delta: String,
}

/// `response.function_call_arguments.done`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallArgumentsDoneEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Owning response.
    #[serde(default)]
    pub response_id: String,
    /// Function call item.
    #[serde(default)]
    pub item_id: String,
    /// Index of the item in the response output.
    #[serde(default)]
    pub output_index: u32,
    /// Call id, echoed back in the function call output.
    pub call_id: String,
    /// Function name, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Complete JSON-encoded arguments.
    pub arguments: String,
}

impl FunctionCallArgumentsDoneEvent {
    /// Parse the arguments as JSON.
    pub fn parsed_arguments(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.arguments)
    }
}

/// `rate_limits.updated`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitsUpdatedEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Current limits.
    pub rate_limits: Vec<RateLimit>,
}

/// `error`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Error details.
    pub error: ErrorInfo,
}

impl ErrorEvent {
    /// Convert into a [`RealtimeError::ServerError`].
    pub fn to_error(&self) -> RealtimeError {
        let code = self.error.code.clone().unwrap_or_else(|| self.error.error_type.clone());
        RealtimeError::ServerError { code, message: self.error.message.clone() }
    }
}

/// `heartbeat`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatEvent {
    /// Server event id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
}

/// A server event with no registered decoder.
///
/// Keeps the raw top-level fields so nothing the server sent is lost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnknownEvent {
    /// The frame's `type`; empty when the frame had none.
    #[serde(rename = "type", default)]
    pub event_type: String,
    /// The frame's `event_id`; empty when the frame had none.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    /// Remaining top-level fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl UnknownEvent {
    /// Build from a decoded JSON object.
    pub fn from_object(object: Map<String, Value>) -> Self {
        let event_type = object.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
        let event_id =
            object.get("event_id").and_then(Value::as_str).unwrap_or_default().to_string();
        Self { event_type, event_id, payload: super::strip_envelope(object) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_event_to_error_prefers_code() {
        let event = ErrorEvent {
            event_id: "evt_1".into(),
            error: ErrorInfo {
                error_type: "invalid_request_error".into(),
                code: Some("invalid_value".into()),
                message: "bad voice".into(),
                ..Default::default()
            },
        };
        let err = ServerEvent::from(event).as_error().unwrap();
        assert_eq!(err.to_string(), "Server error: invalid_value - bad voice");
    }

    #[test]
    fn test_unknown_event_from_object_strips_envelope() {
        let object = serde_json::json!({"type": "x.y", "event_id": "e", "extra": 1});
        let Value::Object(object) = object else { unreachable!() };
        let event = UnknownEvent::from_object(object);
        assert_eq!(event.event_type, "x.y");
        assert_eq!(event.event_id, "e");
        assert_eq!(event.payload.len(), 1);
        assert_eq!(event.payload["extra"], 1);
    }

    #[test]
    fn test_known_types_cover_every_variant() {
        assert_eq!(ServerEvent::KNOWN_TYPES.len(), 30);
        assert!(ServerEvent::KNOWN_TYPES.contains(&"heartbeat"));
    }
}
