//! Event types for realtime communication.
//!
//! Every message in either direction is a JSON object whose `type` field selects the
//! payload shape. [`ClientEvent`] and [`ServerEvent`] are flat enums with one variant per
//! modelled kind; each variant wraps a payload struct holding only that kind's fields.
//! Kinds the crate does not model travel as [`RawClientEvent`] (outbound) or
//! [`UnknownEvent`] (inbound).
//!
//! Audio payloads are raw bytes in memory and base64 text on the wire.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declares a tagged event enum.
///
/// Generates the enum, `event_type()`, `event_id()`, `KNOWN_TYPES`, the `TYPE` constant on
/// every payload, `From<payload>` conversions, a `Serialize` impl that writes `type`
/// followed by the payload fields, and the table of built-in decoders.
macro_rules! tagged_events {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            fallback {
                $(#[$ometa:meta])*
                $open:ident($open_ty:ident)
            }
            $(
                $(#[$vmeta:meta])*
                $tag:literal => $variant:ident($payload:ident),
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant($payload),
            )+
            $(#[$ometa])*
            $open($open_ty),
        }

        impl $name {
            /// Discriminators of every kind modelled by a dedicated variant.
            pub const KNOWN_TYPES: &'static [&'static str] = &[$($tag),+];

            /// The `type` discriminator of this event.
            pub fn event_type(&self) -> &str {
                match self {
                    $(Self::$variant(_) => $tag,)+
                    Self::$open(event) => &event.event_type,
                }
            }

            /// The sender-assigned event id (empty when unset).
            pub fn event_id(&self) -> &str {
                match self {
                    $(Self::$variant(event) => &event.event_id,)+
                    Self::$open(event) => &event.event_id,
                }
            }

            /// Decoders for every modelled kind, keyed by discriminator.
            pub(crate) fn builtin_decoders() -> Vec<(&'static str, $crate::events::PayloadDecoder<$name>)> {
                vec![
                    $((
                        $tag,
                        $crate::events::from_payload::<$payload, $name> as $crate::events::PayloadDecoder<$name>,
                    ),)+
                ]
            }
        }

        $(
            impl $payload {
                /// Wire discriminator of this event kind.
                pub const TYPE: &'static str = $tag;
            }

            impl From<$payload> for $name {
                fn from(event: $payload) -> Self {
                    Self::$variant(event)
                }
            }
        )+

        impl From<$open_ty> for $name {
            fn from(event: $open_ty) -> Self {
                Self::$open(event)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self {
                    $(
                        Self::$variant(payload) => {
                            serde::Serialize::serialize(
                                &$crate::events::Tagged { event_type: $tag, payload },
                                serializer,
                            )
                        }
                    )+
                    Self::$open(event) => serde::Serialize::serialize(event, serializer),
                }
            }
        }
    };
}

mod client;
mod server;

pub use client::*;
pub use server::*;

/// Wire shape of a modelled event: the discriminator followed by the payload fields.
#[derive(Serialize)]
pub(crate) struct Tagged<'a, T: Serialize> {
    #[serde(rename = "type")]
    pub event_type: &'a str,
    #[serde(flatten)]
    pub payload: &'a T,
}

/// Decodes a whole event object into one variant of `E`.
pub(crate) type PayloadDecoder<E> = fn(Value) -> serde_json::Result<E>;

pub(crate) fn from_payload<T, E>(value: Value) -> serde_json::Result<E>
where
    T: DeserializeOwned + Into<E>,
{
    serde_json::from_value::<T>(value).map(Into::into)
}

// ── Shared payload types ────────────────────────────────────────────────

/// A conversation item: a message, a function call, or a function call output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Unique ID for this item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item type: `message`, `function_call` or `function_call_output`.
    #[serde(rename = "type")]
    pub item_type: String,
    /// Always `realtime.item` on server-sent items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    /// `completed`, `incomplete` or `in_progress`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// `user`, `assistant` or `system`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts of a message item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    /// Call id of a function call or function call output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Function name of a function call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// JSON-encoded arguments of a function call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Output of a function call output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    /// A user text message.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some("user".to_string()),
            content: Some(vec![ContentPart::input_text(text)]),
            ..Default::default()
        }
    }

    /// A system message.
    pub fn system_text(text: impl Into<String>) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some("system".to_string()),
            content: Some(vec![ContentPart::input_text(text)]),
            ..Default::default()
        }
    }

    /// The result of a function call.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            call_id: Some(call_id.into()),
            output: Some(output.into()),
            ..Default::default()
        }
    }
}

/// A content part within a conversation item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// `input_text`, `input_audio`, `text` or `audio`.
    #[serde(rename = "type")]
    pub part_type: String,
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64 audio content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Transcript of audio content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl ContentPart {
    /// An `input_text` part.
    pub fn input_text(text: impl Into<String>) -> Self {
        Self { part_type: "input_text".to_string(), text: Some(text.into()), ..Default::default() }
    }
}

/// Token usage of a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Total tokens.
    #[serde(default)]
    pub total_tokens: u64,
    /// Input tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens.
    #[serde(default)]
    pub output_tokens: u64,
    /// Provider breakdown of input tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_details: Option<Value>,
    /// Provider breakdown of output tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_token_details: Option<Value>,
}

/// The `response` object of `response.created` / `response.done`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseObject {
    /// Response id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Always `realtime.response`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    /// `in_progress`, `completed`, `cancelled`, `failed` or `incomplete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Why the response ended the way it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<Value>,
    /// Items produced by the response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<ConversationItem>,
    /// Token usage (on `response.done`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Error details carried by `error` events and failed transcriptions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error category.
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable error message.
    pub message: String,
    /// Parameter that caused the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Id of the client event that caused the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// One entry of `rate_limits.updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    /// `requests` or `tokens`.
    pub name: String,
    /// Maximum allowed.
    pub limit: u64,
    /// Currently remaining.
    pub remaining: u64,
    /// Seconds until the limit resets.
    pub reset_seconds: f64,
}

/// Returns the map with the `type` and `event_id` keys removed.
pub(crate) fn strip_envelope(mut object: Map<String, Value>) -> Map<String, Value> {
    object.remove("type");
    object.remove("event_id");
    object
}
