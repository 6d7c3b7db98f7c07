//! Conversion between the common protocol and the Anthropic Messages format

use super::types::*;
use crate::error::{NailError, NailResult};
use tracing::debug;
use crate::protocol::{
    ChatRequest, ChatResponse, Choice, ContentPart, FinishReason, Message, MessageContent,
    ResponseFormat, Role, StreamFragment, ToolCall, ToolChoice, Usage,
};

const PROVIDER: &str = "anthropic";

/// Convert a ChatRequest to Anthropic format.
///
/// `default_max_tokens` is sent when the request leaves `max_tokens` unset,
/// since the API requires it.
pub fn to_anthropic_request(
    request: &ChatRequest,
    default_max_tokens: u32,
    stream: bool,
) -> NailResult<AnthropicRequest> {
    if request.seed.is_some() {
        return Err(NailError::encoding(PROVIDER, "seed", "the Messages API has no seed parameter"));
    }
    if request.frequency_penalty.is_some() {
        return Err(NailError::encoding(
            PROVIDER,
            "frequency_penalty",
            "the Messages API has no penalty parameters",
        ));
    }
    if request.presence_penalty.is_some() {
        return Err(NailError::encoding(
            PROVIDER,
            "presence_penalty",
            "the Messages API has no penalty parameters",
        ));
    }
    if matches!(
        request.response_format,
        Some(ResponseFormat::JsonObject | ResponseFormat::JsonSchema { .. })
    ) {
        return Err(NailError::encoding(
            PROVIDER,
            "response_format",
            "the Messages API has no structured output mode",
        ));
    }

    let (system, messages) = split_system(request)?;

    let tools = request.tools.as_ref().filter(|t| !t.is_empty()).map(|tools| {
        tools
            .iter()
            .map(|tool| AnthropicTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.parameters.clone(),
            })
            .collect()
    });

    Ok(AnthropicRequest {
        model: request.model.clone(),
        max_tokens: request.max_tokens.unwrap_or(default_max_tokens),
        messages,
        system,
        temperature: request.temperature,
        top_p: request.top_p,
        stop_sequences: request.stop.clone().filter(|s| !s.is_empty()),
        tools,
        tool_choice: request.tool_choice.as_ref().map(|choice| match choice {
            ToolChoice::Auto => AnthropicToolChoice::Auto,
            ToolChoice::None => AnthropicToolChoice::None,
            ToolChoice::Required => AnthropicToolChoice::Any,
            ToolChoice::Tool { name } => AnthropicToolChoice::Tool { name: name.clone() },
        }),
        stream: stream.then_some(true),
    })
}

/// Hoist leading system messages into the top-level `system` field and
/// convert the rest of the conversation.
fn split_system(request: &ChatRequest) -> NailResult<(Option<String>, Vec<AnthropicMessage>)> {
    let mut system_parts = Vec::new();
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for (i, message) in request.messages.iter().enumerate() {
        if message.name.is_some() {
            return Err(NailError::encoding(
                PROVIDER,
                format!("messages[{}].name", i),
                "participant names are not supported",
            ));
        }

        if message.role == Role::System {
            if !messages.is_empty() {
                return Err(NailError::encoding(
                    PROVIDER,
                    format!("messages[{}].role", i),
                    "system messages must precede the conversation",
                ));
            }
            if message.has_images() {
                return Err(NailError::encoding(
                    PROVIDER,
                    format!("messages[{}].content", i),
                    "system prompt must be text",
                ));
            }
            system_parts.push(message.content.text());
            continue;
        }

        let role = match message.role {
            Role::Assistant => "assistant",
            _ => "user",
        };
        let blocks = to_blocks(i, message)?;

        // Tool results travel as user turns; adjacent turns of one role merge.
        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => messages.push(AnthropicMessage {
                role: role.to_string(),
                content: blocks,
            }),
        }
    }

    let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
    Ok((system, messages))
}

fn to_blocks(index: usize, message: &Message) -> NailResult<Vec<AnthropicContentBlock>> {
    if message.has_images() && message.role != Role::User {
        return Err(NailError::encoding(
            PROVIDER,
            format!("messages[{}].content", index),
            format!("image parts are only accepted on user messages, not {}", message.role.as_str()),
        ));
    }

    if message.role == Role::Tool {
        let tool_use_id = message.tool_call_id.clone().ok_or_else(|| {
            NailError::encoding(
                PROVIDER,
                format!("messages[{}].tool_call_id", index),
                "tool result without a tool call id",
            )
        })?;
        return Ok(vec![AnthropicContentBlock::ToolResult {
            tool_use_id,
            content: message.content.text(),
        }]);
    }

    let mut blocks = match &message.content {
        MessageContent::Text(text) if text.is_empty() => Vec::new(),
        MessageContent::Text(text) => vec![AnthropicContentBlock::Text { text: text.clone() }],
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
                ContentPart::ImageUrl { url } => AnthropicContentBlock::Image {
                    source: AnthropicImageSource::Url { url: url.clone() },
                },
                ContentPart::ImageBase64 { media_type, data } => AnthropicContentBlock::Image {
                    source: AnthropicImageSource::Base64 {
                        media_type: media_type.clone(),
                        data: data.clone(),
                    },
                },
            })
            .collect(),
    };

    for (j, call) in message.tool_calls.iter().enumerate() {
        let input = serde_json::from_str(&call.arguments).map_err(|e| {
            NailError::encoding(
                PROVIDER,
                format!("messages[{}].tool_calls[{}].arguments", index, j),
                format!("arguments are not valid JSON: {}", e),
            )
        })?;
        blocks.push(AnthropicContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input,
        });
    }

    Ok(blocks)
}

/// Map an Anthropic `stop_reason` onto the closed set
pub fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCall,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Error,
    }
}

/// Convert an Anthropic response to the common format
pub fn from_anthropic_response(provider: &str, response: AnthropicResponse) -> NailResult<ChatResponse> {
    if response.role != "assistant" {
        return Err(NailError::decoding(
            provider,
            format!("unexpected role '{}' in response", response.role),
        ));
    }

    let finish_reason = response
        .stop_reason
        .as_deref()
        .map(map_stop_reason)
        .ok_or_else(|| NailError::decoding(provider, "response has no stop_reason"))?;

    let usage = match (response.usage.input_tokens, response.usage.output_tokens) {
        (Some(input), Some(output)) => Usage::new(input, output),
        _ => return Err(NailError::decoding(provider, "usage is missing token counts")),
    };

    let mut text = String::new();
    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            AnthropicContentBlock::Text { text: t } => {
                text.push_str(&t);
                parts.push(ContentPart::Text { text: t });
            }
            AnthropicContentBlock::Image { source } => parts.push(match source {
                AnthropicImageSource::Base64 { media_type, data } => {
                    ContentPart::ImageBase64 { media_type, data }
                }
                AnthropicImageSource::Url { url } => ContentPart::ImageUrl { url },
            }),
            AnthropicContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                name,
                arguments: input.to_string(),
            }),
            AnthropicContentBlock::ToolResult { .. } => {
                return Err(NailError::decoding(provider, "tool_result block in response"));
            }
            AnthropicContentBlock::Thinking { .. } | AnthropicContentBlock::RedactedThinking { .. } => {
                debug!("Skipping thinking block in {} response", provider);
            }
            AnthropicContentBlock::Unsupported => {
                return Err(NailError::decoding(
                    provider,
                    "response contains a content block of an unsupported type",
                ));
            }
        }
    }

    let content = if parts.iter().all(|p| !p.is_image()) {
        MessageContent::Text(text)
    } else {
        MessageContent::Parts(parts)
    };

    let message = Message {
        role: Role::Assistant,
        content,
        name: None,
        tool_calls,
        tool_call_id: None,
    };

    Ok(ChatResponse {
        id: response.id,
        provider: provider.to_string(),
        model: response.model,
        choices: vec![Choice {
            index: 0,
            message,
            finish_reason,
        }],
        finish_reason,
        usage,
    })
}

/// Convert one streaming event into fragments
pub fn from_anthropic_stream_event(
    provider: &str,
    event: AnthropicStreamEvent,
) -> NailResult<Vec<StreamFragment>> {
    let fragments = match event {
        AnthropicStreamEvent::MessageStart { message } => {
            let mut fragments = vec![StreamFragment::Start {
                id: Some(message.id),
                model: Some(message.model),
            }];
            if let Some(usage) = message.usage {
                fragments.push(StreamFragment::Usage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                });
            }
            fragments
        }
        AnthropicStreamEvent::ContentBlockStart {
            index,
            content_block,
        } => match content_block {
            AnthropicContentBlock::Text { text } if !text.is_empty() => {
                vec![StreamFragment::TextDelta { text }]
            }
            AnthropicContentBlock::ToolUse { id, name, .. } => vec![StreamFragment::ToolCallDelta {
                call_index: index,
                id: Some(id),
                name: Some(name),
                arguments: String::new(),
            }],
            AnthropicContentBlock::Unsupported => {
                return Err(NailError::decoding(
                    provider,
                    format!("content block {} has an unsupported type", index),
                ));
            }
            AnthropicContentBlock::Thinking { .. } | AnthropicContentBlock::RedactedThinking { .. } => {
                debug!(index, "Skipping thinking block in {} stream", provider);
                Vec::new()
            }
            _ => Vec::new(),
        },
        AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
            AnthropicDelta::TextDelta { text } => vec![StreamFragment::TextDelta { text }],
            AnthropicDelta::InputJsonDelta { partial_json } => vec![StreamFragment::ToolCallDelta {
                call_index: index,
                id: None,
                name: None,
                arguments: partial_json,
            }],
            AnthropicDelta::Unsupported => Vec::new(),
        },
        AnthropicStreamEvent::MessageDelta { delta, usage } => {
            let mut fragments = Vec::new();
            if let Some(usage) = usage {
                fragments.push(StreamFragment::Usage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                });
            }
            if let Some(reason) = delta.stop_reason {
                fragments.push(StreamFragment::Finish {
                    reason: map_stop_reason(&reason),
                });
            }
            fragments
        }
        AnthropicStreamEvent::ContentBlockStop { .. }
        | AnthropicStreamEvent::MessageStop
        | AnthropicStreamEvent::Ping
        | AnthropicStreamEvent::Unknown => Vec::new(),
        AnthropicStreamEvent::Error { error } => {
            return Err(NailError::transport(
                None,
                format!("{} stream error: {}: {}", provider, error.error_type, error.message),
            ));
        }
    };

    Ok(fragments)
}
