//! Conversion between the common protocol and the OpenAI Chat Completions format

use super::types::*;
use crate::error::{NailError, NailResult};
use crate::protocol::{
    ChatRequest, ChatResponse, Choice, ContentPart, FinishReason, Message, MessageContent,
    ResponseFormat, Role, StreamFragment, ToolCall, ToolChoice, ToolDefinition, Usage,
};
use crate::translators::split_data_url;

const PROVIDER: &str = "openai";

/// Convert a ChatRequest to OpenAI format
pub fn to_openai_request(request: &ChatRequest, stream: bool) -> NailResult<OpenAIRequest> {
    let messages = request
        .messages
        .iter()
        .enumerate()
        .map(|(i, m)| to_openai_message(i, m))
        .collect::<NailResult<Vec<_>>>()?;

    Ok(OpenAIRequest {
        model: request.model.clone(),
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        top_p: request.top_p,
        frequency_penalty: request.frequency_penalty,
        presence_penalty: request.presence_penalty,
        stop: request.stop.clone().filter(|s| !s.is_empty()),
        seed: request.seed,
        tools: request
            .tools
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|tools| tools.iter().map(to_openai_tool).collect()),
        tool_choice: request.tool_choice.as_ref().map(to_openai_tool_choice),
        response_format: request.response_format.as_ref().map(to_openai_response_format),
        stream: stream.then_some(true),
        stream_options: stream.then_some(OpenAIStreamOptions {
            include_usage: true,
        }),
    })
}

fn to_openai_response_format(format: &ResponseFormat) -> OpenAIResponseFormat {
    match format {
        ResponseFormat::Text => OpenAIResponseFormat::Text,
        ResponseFormat::JsonObject => OpenAIResponseFormat::JsonObject,
        ResponseFormat::JsonSchema {
            name,
            description,
            schema,
            strict,
        } => OpenAIResponseFormat::JsonSchema {
            json_schema: OpenAIJsonSchema {
                name: name.clone(),
                description: description.clone(),
                schema: schema.clone(),
                strict: *strict,
            },
        },
    }
}

fn to_openai_message(index: usize, message: &Message) -> NailResult<OpenAIMessage> {
    // Only user turns may carry images on this API.
    if message.has_images() && message.role != Role::User {
        return Err(NailError::encoding(
            PROVIDER,
            format!("messages[{}].content", index),
            format!("image parts are only accepted on user messages, not {}", message.role.as_str()),
        ));
    }

    let content = if message.role == Role::Assistant
        && !message.tool_calls.is_empty()
        && message.content.is_empty()
    {
        None
    } else {
        Some(to_openai_content(&message.content))
    };

    let tool_calls = (!message.tool_calls.is_empty()).then(|| {
        message
            .tool_calls
            .iter()
            .map(|tc| OpenAIToolCall {
                id: tc.id.clone(),
                tool_type: "function".to_string(),
                function: OpenAIFunctionCall {
                    name: tc.name.clone(),
                    arguments: tc.arguments.clone(),
                },
            })
            .collect()
    });

    Ok(OpenAIMessage {
        role: message.role.as_str().to_string(),
        content,
        name: message.name.clone(),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
        refusal: None,
    })
}

fn to_openai_content(content: &MessageContent) -> OpenAIContent {
    match content {
        MessageContent::Text(text) => OpenAIContent::Text(text.clone()),
        MessageContent::Parts(parts) => OpenAIContent::Parts(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => OpenAIContentPart::Text { text: text.clone() },
                    ContentPart::ImageUrl { url } => OpenAIContentPart::ImageUrl {
                        image_url: OpenAIImageUrl {
                            url: url.clone(),
                            detail: None,
                        },
                    },
                    ContentPart::ImageBase64 { media_type, data } => OpenAIContentPart::ImageUrl {
                        image_url: OpenAIImageUrl {
                            url: format!("data:{};base64,{}", media_type, data),
                            detail: None,
                        },
                    },
                })
                .collect(),
        ),
    }
}

fn to_openai_tool(tool: &ToolDefinition) -> OpenAITool {
    OpenAITool {
        tool_type: "function".to_string(),
        function: OpenAIFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

fn to_openai_tool_choice(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => serde_json::json!("auto"),
        ToolChoice::None => serde_json::json!("none"),
        ToolChoice::Required => serde_json::json!("required"),
        ToolChoice::Tool { name } => serde_json::json!({
            "type": "function",
            "function": { "name": name }
        }),
    }
}

/// Map an OpenAI-compatible `finish_reason` onto the closed set
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolCall,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Error,
    }
}

/// Convert an OpenAI response to the common format
pub fn from_openai_response(provider: &str, response: OpenAIResponse) -> NailResult<ChatResponse> {
    if response.choices.is_empty() {
        return Err(NailError::decoding(provider, "response has no choices"));
    }

    let usage = response
        .usage
        .map(from_openai_usage)
        .ok_or_else(|| NailError::decoding(provider, "response has no usage block"))?;

    let choices = response
        .choices
        .into_iter()
        .map(|c| from_openai_choice(provider, c))
        .collect::<NailResult<Vec<_>>>()?;

    Ok(ChatResponse {
        id: response.id,
        provider: provider.to_string(),
        model: response.model,
        finish_reason: choices[0].finish_reason,
        choices,
        usage,
    })
}

fn from_openai_choice(provider: &str, choice: OpenAIChoice) -> NailResult<Choice> {
    let reason = choice.finish_reason.as_deref().ok_or_else(|| {
        NailError::decoding(
            provider,
            format!("choice {} has no finish_reason", choice.index),
        )
    })?;
    let mut finish_reason = map_finish_reason(reason);

    let refused = choice.message.refusal.is_some()
        && choice
            .message
            .content
            .as_ref()
            .map_or(true, |c| matches!(c, OpenAIContent::Text(t) if t.is_empty()));
    if refused {
        finish_reason = FinishReason::ContentFilter;
    }

    Ok(Choice {
        index: choice.index,
        message: from_openai_message(provider, choice.message)?,
        finish_reason,
    })
}

fn from_openai_message(provider: &str, message: OpenAIMessage) -> NailResult<Message> {
    if message.role != "assistant" {
        return Err(NailError::decoding(
            provider,
            format!("unexpected role '{}' in response message", message.role),
        ));
    }

    let content = match (message.content, message.refusal) {
        (Some(OpenAIContent::Text(text)), Some(refusal)) if text.is_empty() => {
            MessageContent::Text(refusal)
        }
        (Some(content), _) => from_openai_content(content),
        (None, Some(refusal)) => MessageContent::Text(refusal),
        (None, None) => MessageContent::Text(String::new()),
    };

    Ok(Message {
        role: Role::Assistant,
        content,
        name: message.name,
        tool_calls: message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect(),
        tool_call_id: None,
    })
}

fn from_openai_content(content: OpenAIContent) -> MessageContent {
    match content {
        OpenAIContent::Text(text) => MessageContent::Text(text),
        OpenAIContent::Parts(parts) => MessageContent::Parts(
            parts
                .into_iter()
                .map(|part| match part {
                    OpenAIContentPart::Text { text } => ContentPart::Text { text },
                    OpenAIContentPart::ImageUrl { image_url } => {
                        match split_data_url(&image_url.url) {
                            Some((media_type, data)) => ContentPart::ImageBase64 { media_type, data },
                            None => ContentPart::ImageUrl { url: image_url.url },
                        }
                    }
                })
                .collect(),
        ),
    }
}

fn from_openai_usage(usage: OpenAIUsage) -> Usage {
    Usage::new(usage.prompt_tokens, usage.completion_tokens)
}

/// Convert one OpenAI streaming chunk into fragments.
///
/// Only the first choice is streamed; other choices are ignored.
pub fn from_openai_stream_chunk(
    provider: &str,
    chunk: OpenAIStreamChunk,
) -> NailResult<Vec<StreamFragment>> {
    if let Some(error) = chunk.error {
        let message = match error.error_type {
            Some(kind) => format!("{}: {}", kind, error.message),
            None => error.message,
        };
        return Err(NailError::transport(None, format!("{} stream error: {}", provider, message)));
    }

    let mut fragments = Vec::new();

    if let Some(choice) = chunk.choices.into_iter().find(|c| c.index == 0) {
        if choice.delta.role.is_some() {
            fragments.push(StreamFragment::Start {
                id: chunk.id,
                model: chunk.model,
            });
        }

        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            fragments.push(StreamFragment::TextDelta { text });
        }
        if let Some(text) = choice.delta.refusal.filter(|t| !t.is_empty()) {
            fragments.push(StreamFragment::TextDelta { text });
        }

        for delta in choice.delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = match delta.function {
                Some(f) => (f.name, f.arguments.unwrap_or_default()),
                None => (None, String::new()),
            };
            fragments.push(StreamFragment::ToolCallDelta {
                call_index: delta.index,
                id: delta.id,
                name,
                arguments,
            });
        }

        if let Some(reason) = choice.finish_reason {
            fragments.push(StreamFragment::Finish {
                reason: map_finish_reason(&reason),
            });
        }
    }

    if let Some(usage) = chunk.usage {
        fragments.push(StreamFragment::Usage {
            input_tokens: Some(usage.prompt_tokens),
            output_tokens: Some(usage.completion_tokens),
        });
    }

    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_base64_image_becomes_data_url() {
        let message = crate::protocol::MessageBuilder::with_parts(
            Role::User,
            vec![ContentPart::ImageBase64 {
                media_type: "image/png".into(),
                data: "iVBOR".into(),
            }],
        )
        .build();
        let request = ChatRequest::new("gpt-4o", vec![message]);

        let native = to_openai_request(&request, false).unwrap();
        let value = serde_json::to_value(&native).unwrap();
        assert_eq!(
            value["messages"][0]["content"][0]["image_url"]["url"],
            "data:image/png;base64,iVBOR"
        );
    }

    #[test]
    fn test_image_on_system_message_is_encoding_error() {
        let message = crate::protocol::MessageBuilder::with_parts(
            Role::System,
            vec![ContentPart::ImageUrl {
                url: "https://example.com/a.png".into(),
            }],
        )
        .build();
        let request = ChatRequest::new("gpt-4o", vec![message, Message::user("hi")]);

        let err = to_openai_request(&request, false).unwrap_err();
        assert!(matches!(err, NailError::Encoding { field, .. } if field == "messages[0].content"));
    }

    #[test]
    fn test_streaming_sets_include_usage() {
        let request = ChatRequest::new("gpt-4o", vec![Message::user("hi")]);
        let value = serde_json::to_value(to_openai_request(&request, true).unwrap()).unwrap();
        assert_eq!(value["stream"], true);
        assert_eq!(value["stream_options"]["include_usage"], true);

        let value = serde_json::to_value(to_openai_request(&request, false).unwrap()).unwrap();
        assert!(value.get("stream").is_none());
    }

    #[test]
    fn test_refusal_maps_to_content_filter() {
        let response: OpenAIResponse = parse(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": null, "refusal": "I can't help with that." },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 6, "total_tokens": 11 }
        }));

        let decoded = from_openai_response("openai", response).unwrap();
        assert_eq!(decoded.finish_reason, FinishReason::ContentFilter);
        assert_eq!(decoded.text().as_deref(), Some("I can't help with that."));
    }

    #[test]
    fn test_missing_finish_reason_is_decoding_error() {
        let response: OpenAIResponse = parse(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "hi" } }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        }));

        assert!(matches!(
            from_openai_response("openai", response),
            Err(NailError::Decoding { .. })
        ));
    }

    #[test]
    fn test_stream_chunk_with_tool_call_delta() {
        let chunk: OpenAIStreamChunk = parse(json!({
            "id": "chatcmpl-2",
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "delta": {
                    "tool_calls": [{
                        "index": 0,
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "get_weather", "arguments": "{\"ci" }
                    }]
                },
                "finish_reason": null
            }]
        }));

        let fragments = from_openai_stream_chunk("openai", chunk).unwrap();
        assert_eq!(
            fragments,
            vec![StreamFragment::ToolCallDelta {
                call_index: 0,
                id: Some("call_1".into()),
                name: Some("get_weather".into()),
                arguments: "{\"ci".into(),
            }]
        );
    }
}
