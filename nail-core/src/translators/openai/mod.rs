//! OpenAI Chat Completions translator
//!
//! Maps the common protocol onto `POST /chat/completions`. Base64 images
//! travel as `data:` URLs, tools as `function` tools, and streaming asks
//! the server to append a final usage chunk.

pub mod converter;
pub mod types;

use super::{parse_native, to_payload, NativePayload, Translator};
use crate::capabilities::Capabilities;
use crate::config::SecretString;
use crate::error::NailResult;
use crate::protocol::{ChatRequest, ChatResponse, StreamFragment};
use types::{OpenAIResponse, OpenAIStreamChunk};

pub use converter::map_finish_reason;

/// Default OpenAI API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Most stop sequences the API accepts
pub const MAX_STOP_SEQUENCES: usize = 4;

/// Translator for the OpenAI Chat Completions API
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAITranslator;

impl OpenAITranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator for OpenAITranslator {
    fn name(&self) -> &str {
        "openai"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_stop_sequences: Some(MAX_STOP_SEQUENCES),
            ..Capabilities::all()
        }
    }

    fn default_base_url(&self) -> &str {
        DEFAULT_BASE_URL
    }

    fn chat_path(&self) -> &str {
        "/chat/completions"
    }

    fn auth_headers(&self, credential: &SecretString) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", credential.expose_secret()),
        )]
    }

    fn encode(&self, request: &ChatRequest) -> NailResult<NativePayload> {
        to_payload(self.name(), &converter::to_openai_request(request, false)?)
    }

    fn encode_streaming(&self, request: &ChatRequest) -> NailResult<NativePayload> {
        to_payload(self.name(), &converter::to_openai_request(request, true)?)
    }

    fn decode(&self, body: &[u8]) -> NailResult<ChatResponse> {
        let response: OpenAIResponse = parse_native(self.name(), body)?;
        converter::from_openai_response(self.name(), response)
    }

    fn decode_stream_event(&self, _event: &str, data: &str) -> NailResult<Vec<StreamFragment>> {
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return Ok(Vec::new());
        }

        let chunk: OpenAIStreamChunk = parse_native(self.name(), data.as_bytes())?;
        converter::from_openai_stream_chunk(self.name(), chunk)
    }
}
