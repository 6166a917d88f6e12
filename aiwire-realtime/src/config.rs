//! Configuration types: the wire `session` object and client connection settings.

use crate::audio::AudioEncoding;
use crate::error::{RealtimeError, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

/// Default realtime endpoint.
pub const DEFAULT_REALTIME_URL: &str = "wss://api.aiwire.dev/v1/realtime";

/// Default timeout for establishing the WebSocket connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable holding the endpoint URL.
pub const ENV_REALTIME_URL: &str = "AIWIRE_REALTIME_URL";
/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "AIWIRE_API_KEY";
/// Environment variable holding the model id.
pub const ENV_MODEL: &str = "AIWIRE_REALTIME_MODEL";
/// Environment variable holding the connect timeout in seconds.
pub const ENV_CONNECT_TIMEOUT: &str = "AIWIRE_CONNECT_TIMEOUT_SECS";

/// Voice Activity Detection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VadMode {
    /// Server-side VAD.
    #[default]
    ServerVad,
    /// Semantic VAD.
    SemanticVad,
    /// Client-side VAD; the client commits the buffer itself.
    ClientVad,
}

/// `turn_detection` settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    /// VAD mode to use.
    #[serde(rename = "type")]
    pub mode: VadMode,
    /// Silence duration (ms) before considering speech ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silence_duration_ms: Option<u32>,
    /// Detection threshold (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    /// Prefix padding (ms) to include before detected speech.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_padding_ms: Option<u32>,
    /// Whether a response is created automatically when speech stops.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_response: Option<bool>,
    /// Whether to interrupt the model when user starts speaking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt_response: Option<bool>,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            mode: VadMode::ServerVad,
            silence_duration_ms: Some(500),
            threshold: None,
            prefix_padding_ms: None,
            create_response: None,
            interrupt_response: Some(true),
        }
    }
}

impl TurnDetection {
    /// Server VAD with default settings.
    pub fn server_vad() -> Self {
        Self::default()
    }

    /// Client-side turn management.
    pub fn client_vad() -> Self {
        Self { mode: VadMode::ClientVad, silence_duration_ms: None, ..Default::default() }
    }

    /// Set silence duration threshold.
    pub fn with_silence_duration(mut self, ms: u32) -> Self {
        self.silence_duration_ms = Some(ms);
        self
    }
}

/// Tool/function definition exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Always `"function"` for function tools.
    #[serde(rename = "type", default = "function_tool_type")]
    pub tool_type: String,
    /// Tool name.
    pub name: String,
    /// Tool description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

fn function_tool_type() -> String {
    "function".to_string()
}

impl ToolDefinition {
    /// Create a new function tool.
    pub fn new(name: impl Into<String>) -> Self {
        Self { tool_type: function_tool_type(), name: name.into(), description: None, parameters: None }
    }

    /// Set the tool description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set the parameters schema.
    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = Some(schema);
        self
    }
}

/// Input audio transcription settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Transcription model to use.
    pub model: String,
}

/// `max_response_output_tokens`: a count or the literal `"inf"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxOutputTokens {
    /// Hard limit.
    Count(u32),
    /// No limit (`"inf"` on the wire).
    Inf(InfLiteral),
}

/// The `"inf"` literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfLiteral {
    /// `"inf"`.
    #[serde(rename = "inf")]
    Inf,
}

/// The `session` object carried by `session.update`, `session.created` and
/// `session.updated`.
///
/// Every field is optional so that updates can be partial. Fields this type does not
/// model are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Server-assigned session id (server events only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Model to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Output modalities: `["text"]`, `["audio"]`, or both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    /// System instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Voice used for audio output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Input audio format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<AudioEncoding>,
    /// Output audio format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<AudioEncoding>,
    /// Input transcription settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionConfig>,
    /// Turn detection settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
    /// Tools available to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool selection mode: `"auto"`, `"none"`, `"required"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Output token limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_output_tokens: Option<MaxOutputTokens>,
    /// Provider-specific fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionConfig {
    /// Create an empty (no-op) update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the system instructions.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set the voice.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Enable text and audio output.
    pub fn with_text_and_audio(mut self) -> Self {
        self.modalities = Some(vec!["text".to_string(), "audio".to_string()]);
        self
    }

    /// Set input and output audio encodings.
    pub fn with_audio_formats(mut self, input: AudioEncoding, output: AudioEncoding) -> Self {
        self.input_audio_format = Some(input);
        self.output_audio_format = Some(output);
        self
    }

    /// Set turn detection.
    pub fn with_turn_detection(mut self, turn_detection: TurnDetection) -> Self {
        self.turn_detection = Some(turn_detection);
        self
    }

    /// Enable input transcription with the given model.
    pub fn with_transcription(mut self, model: impl Into<String>) -> Self {
        self.input_audio_transcription = Some(TranscriptionConfig { model: model.into() });
        self
    }

    /// Add a tool definition.
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.get_or_insert_with(Vec::new).push(tool);
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set a provider-specific field.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Connection settings for a realtime client.
#[derive(Debug, Clone)]
pub struct RealtimeClientConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub endpoint: String,
    /// Bearer token sent in the `Authorization` header.
    pub api_key: Option<SecretString>,
    /// Model id appended as `?model=` when set.
    pub model: Option<String>,
    /// Timeout for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Extra handshake headers.
    pub headers: Vec<(String, String)>,
}

impl Default for RealtimeClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_REALTIME_URL.to_string(),
            api_key: None,
            model: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            headers: Vec::new(),
        }
    }
}

impl RealtimeClientConfig {
    /// Create a configuration for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Default::default() }
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, falling back to defaults for missing keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(endpoint) = lookup(ENV_REALTIME_URL) {
            config.endpoint = endpoint;
        }
        config.api_key = lookup(ENV_API_KEY).map(SecretString::from);
        config.model = lookup(ENV_MODEL);
        if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                RealtimeError::config(format!("{ENV_CONNECT_TIMEOUT} must be whole seconds, got '{raw}'"))
            })?;
            config.connect_timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Add a handshake header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Check the endpoint scheme and timeout.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| RealtimeError::config(format!("invalid endpoint '{}': {e}", self.endpoint)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RealtimeError::config(format!(
                "endpoint must use ws:// or wss://, got '{}'",
                url.scheme()
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(RealtimeError::config("connect timeout must be non-zero"));
        }
        Ok(())
    }

    /// Endpoint with the model query parameter applied.
    pub fn endpoint_url(&self) -> Result<Url> {
        self.validate()?;
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| RealtimeError::config(format!("invalid endpoint: {e}")))?;
        if let Some(model) = &self.model {
            url.query_pairs_mut().append_pair("model", model);
        }
        Ok(url)
    }
}
