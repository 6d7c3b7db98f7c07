//! Anthropic Messages API translator
//!
//! System messages become the top-level `system` field, tool results are
//! sent as `tool_result` blocks inside user turns, and `max_tokens` is
//! always present because the API requires it.

pub mod converter;
pub mod types;

use super::{parse_native, to_payload, NativePayload, Translator};
use crate::capabilities::Capabilities;
use crate::config::SecretString;
use crate::error::NailResult;
use crate::protocol::{ChatRequest, ChatResponse, StreamFragment};
use types::{AnthropicResponse, AnthropicStreamEvent};

pub use converter::map_stop_reason;

/// Default Anthropic API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// API version sent with every request
pub const API_VERSION: &str = "2023-06-01";

/// `max_tokens` sent when the request leaves it unset
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Translator for the Anthropic Messages API
#[derive(Debug, Clone, Copy)]
pub struct AnthropicTranslator {
    default_max_tokens: u32,
}

impl AnthropicTranslator {
    pub fn new() -> Self {
        Self {
            default_max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_default_max_tokens(mut self, default_max_tokens: u32) -> Self {
        self.default_max_tokens = default_max_tokens;
        self
    }

    pub fn default_max_tokens(&self) -> u32 {
        self.default_max_tokens
    }
}

impl Default for AnthropicTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator for AnthropicTranslator {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            seed: false,
            penalties: false,
            response_format: false,
            json_schema: false,
            ..Capabilities::all()
        }
    }

    fn default_base_url(&self) -> &str {
        DEFAULT_BASE_URL
    }

    fn chat_path(&self) -> &str {
        "/messages"
    }

    fn auth_headers(&self, credential: &SecretString) -> Vec<(String, String)> {
        vec![
            ("x-api-key".to_string(), credential.expose_secret().to_string()),
            ("anthropic-version".to_string(), API_VERSION.to_string()),
        ]
    }

    fn encode(&self, request: &ChatRequest) -> NailResult<NativePayload> {
        let native = converter::to_anthropic_request(request, self.default_max_tokens, false)?;
        to_payload(self.name(), &native)
    }

    fn encode_streaming(&self, request: &ChatRequest) -> NailResult<NativePayload> {
        let native = converter::to_anthropic_request(request, self.default_max_tokens, true)?;
        to_payload(self.name(), &native)
    }

    fn decode(&self, body: &[u8]) -> NailResult<ChatResponse> {
        let response: AnthropicResponse = parse_native(self.name(), body)?;
        converter::from_anthropic_response(self.name(), response)
    }

    /// The payload's own `type` field is authoritative; the SSE event name
    /// repeats it and is not consulted.
    fn decode_stream_event(&self, _event: &str, data: &str) -> NailResult<Vec<StreamFragment>> {
        let data = data.trim();
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let event: AnthropicStreamEvent = parse_native(self.name(), data.as_bytes())?;
        converter::from_anthropic_stream_event(self.name(), event)
    }
}
