//! Chutes translator
//!
//! Chutes serves open-weight models behind a vLLM-compatible API. Requests
//! are a text-only subset of the OpenAI shape; responses and stream chunks
//! are OpenAI-compatible and decoded with the OpenAI converter. Tool
//! calling is not offered.
//!
//! When talking to a chute's generic function endpoint instead of the
//! OpenAI-compatible one, enable [`ChutesTranslator::with_invocation_wrapper`]:
//! the request is then wrapped in `{"input_args": ...}` and posted to the
//! configured base URL as-is.

pub mod types;

use super::openai::converter::{from_openai_response, from_openai_stream_chunk};
use super::openai::types::{OpenAIResponse, OpenAIStreamChunk};
use super::{parse_native, to_payload, NativePayload, Translator};
use crate::capabilities::Capabilities;
use crate::config::SecretString;
use crate::error::{NailError, NailResult};
use crate::protocol::{ChatRequest, ChatResponse, ResponseFormat, StreamFragment};
use types::{
    ChutesChatRequest, ChutesInvocation, ChutesJsonSchema, ChutesMessage, ChutesResponseFormat,
    StopSequence,
};

/// Default Chutes LLM API base URL
pub const DEFAULT_BASE_URL: &str = "https://llm.chutes.ai/v1";

const PROVIDER: &str = "chutes";

/// Translator for Chutes-hosted models
#[derive(Debug, Clone, Copy, Default)]
pub struct ChutesTranslator {
    wrap_invocation: bool,
}

impl ChutesTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap requests in the `input_args` invocation envelope
    pub fn with_invocation_wrapper(mut self) -> Self {
        self.wrap_invocation = true;
        self
    }

    pub fn wraps_invocation(&self) -> bool {
        self.wrap_invocation
    }

    fn to_chutes_request(&self, request: &ChatRequest, stream: bool) -> NailResult<ChutesChatRequest> {
        if request.uses_tools() {
            return Err(NailError::encoding(PROVIDER, "tools", "tool calling is not supported"));
        }

        let messages = request
            .messages
            .iter()
            .enumerate()
            .map(|(i, message)| {
                if message.has_images() {
                    return Err(NailError::encoding(
                        PROVIDER,
                        format!("messages[{}].content", i),
                        "only text content is supported",
                    ));
                }
                if message.name.is_some() {
                    return Err(NailError::encoding(
                        PROVIDER,
                        format!("messages[{}].name", i),
                        "participant names are not supported",
                    ));
                }
                Ok(ChutesMessage {
                    role: message.role.as_str().to_string(),
                    content: message.content.text(),
                })
            })
            .collect::<NailResult<Vec<_>>>()?;

        let seed = request
            .seed
            .map(|seed| {
                u64::try_from(seed).map_err(|_| {
                    NailError::encoding(PROVIDER, "seed", format!("seed must be non-negative (got {})", seed))
                })
            })
            .transpose()?;

        let stop = match request.stop.as_deref() {
            None | Some([]) => None,
            Some([single]) => Some(StopSequence::Single(single.clone())),
            Some(many) => Some(StopSequence::Array(many.to_vec())),
        };

        Ok(ChutesChatRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
            frequency_penalty: request.frequency_penalty,
            presence_penalty: request.presence_penalty,
            stop,
            seed,
            response_format: request.response_format.as_ref().map(to_chutes_response_format),
            stream: stream.then_some(true),
        })
    }

    fn payload(&self, native: ChutesChatRequest) -> NailResult<NativePayload> {
        if self.wrap_invocation {
            to_payload(PROVIDER, &ChutesInvocation { input_args: native })
        } else {
            to_payload(PROVIDER, &native)
        }
    }
}

fn to_chutes_response_format(format: &ResponseFormat) -> ChutesResponseFormat {
    match format {
        ResponseFormat::Text => ChutesResponseFormat::Text,
        ResponseFormat::JsonObject => ChutesResponseFormat::JsonObject,
        ResponseFormat::JsonSchema {
            name,
            description,
            schema,
            strict,
        } => ChutesResponseFormat::JsonSchema {
            json_schema: ChutesJsonSchema {
                name: name.clone(),
                description: description.clone(),
                schema: schema.clone(),
                strict: *strict,
            },
        },
    }
}

impl Translator for ChutesTranslator {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            seed: true,
            response_format: true,
            json_schema: true,
            ..Capabilities::default()
        }
    }

    fn default_base_url(&self) -> &str {
        DEFAULT_BASE_URL
    }

    fn chat_path(&self) -> &str {
        if self.wrap_invocation {
            ""
        } else {
            "/chat/completions"
        }
    }

    fn auth_headers(&self, credential: &SecretString) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", credential.expose_secret()),
        )]
    }

    fn encode(&self, request: &ChatRequest) -> NailResult<NativePayload> {
        self.payload(self.to_chutes_request(request, false)?)
    }

    fn encode_streaming(&self, request: &ChatRequest) -> NailResult<NativePayload> {
        self.payload(self.to_chutes_request(request, true)?)
    }

    fn decode(&self, body: &[u8]) -> NailResult<ChatResponse> {
        let response: OpenAIResponse = parse_native(PROVIDER, body)?;
        from_openai_response(PROVIDER, response)
    }

    fn decode_stream_event(&self, _event: &str, data: &str) -> NailResult<Vec<StreamFragment>> {
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return Ok(Vec::new());
        }

        let chunk: OpenAIStreamChunk = parse_native(PROVIDER, data.as_bytes())?;
        from_openai_stream_chunk(PROVIDER, chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Message;

    #[test]
    fn test_single_stop_is_sent_as_string() {
        let request = ChatRequest::new("deepseek-ai/DeepSeek-V3", vec![Message::user("hi")])
            .with_stop_sequence("END");
        let payload = ChutesTranslator::new().encode(&request).unwrap();
        assert_eq!(payload["stop"], "END");
    }

    #[test]
    fn test_invocation_wrapper() {
        let translator = ChutesTranslator::new().with_invocation_wrapper();
        let request = ChatRequest::new("deepseek-ai/DeepSeek-V3", vec![Message::user("hi")]);
        let payload = translator.encode(&request).unwrap();
        assert_eq!(payload["input_args"]["model"], "deepseek-ai/DeepSeek-V3");
        assert_eq!(payload["input_args"]["messages"][0]["content"], "hi");
        assert_eq!(translator.chat_path(), "");
    }

    #[test]
    fn test_negative_seed_is_encoding_error() {
        let request = ChatRequest::new("m", vec![Message::user("hi")]).with_seed(-1);
        let err = ChutesTranslator::new().encode(&request).unwrap_err();
        assert!(matches!(err, NailError::Encoding { field, .. } if field == "seed"));
    }

    #[test]
    fn test_tool_messages_are_rejected() {
        let request = ChatRequest::new("m", vec![Message::user("hi"), Message::tool("call_1", "42")]);
        assert!(matches!(
            ChutesTranslator::new().encode(&request),
            Err(NailError::Encoding { .. })
        ));
    }
}
