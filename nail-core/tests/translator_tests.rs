//! Translator contract tests against recorded provider payloads

use nail_core::translators::anthropic::map_stop_reason;
use nail_core::translators::openai::map_finish_reason;
use nail_core::translators::{AnthropicTranslator, ChutesTranslator, OpenAITranslator, Translator};
use nail_core::{
    ChatRequest, ContentPart, FinishReason, Message, MessageContent, NailError, ResponseFormat,
    ToolChoice, ToolDefinition,
};
use nail_core::protocol::MessageBuilder;
use proptest::prelude::*;
use serde_json::json;
use test_case::test_case;

const OPENAI_TOOL_RESPONSE: &str = r#"{
    "id": "chatcmpl-tool",
    "object": "chat.completion",
    "created": 1700000000,
    "model": "gpt-4o-2024-08-06",
    "choices": [{
        "index": 0,
        "message": {
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}
            }]
        },
        "logprobs": null,
        "finish_reason": "tool_calls"
    }],
    "usage": {"prompt_tokens": 82, "completion_tokens": 17, "total_tokens": 99},
    "system_fingerprint": "fp_1"
}"#;

const OPENAI_REFUSAL_RESPONSE: &str = r#"{
    "id": "chatcmpl-refusal",
    "model": "gpt-4o",
    "choices": [{
        "index": 0,
        "message": {"role": "assistant", "content": null, "refusal": "I can't help with that."},
        "finish_reason": "stop"
    }],
    "usage": {"prompt_tokens": 10, "completion_tokens": 7}
}"#;

const ANTHROPIC_RESPONSE: &str = r#"{
    "id": "msg_01",
    "type": "message",
    "role": "assistant",
    "model": "claude-3-5-sonnet-20241022",
    "content": [
        {"type": "text", "text": "Let me check. "},
        {"type": "tool_use", "id": "toolu_01", "name": "get_weather", "input": {"city": "Paris"}}
    ],
    "stop_reason": "tool_use",
    "stop_sequence": null,
    "usage": {"input_tokens": 120, "output_tokens": 45}
}"#;

fn weather_tool() -> ToolDefinition {
    ToolDefinition::new(
        "get_weather",
        json!({"type": "object", "properties": {"city": {"type": "string"}}, "required": ["city"]}),
    )
    .with_description("Current weather for a city")
}

fn tool_conversation() -> ChatRequest {
    ChatRequest::new(
        "any-model",
        vec![
            Message::system("Be brief."),
            Message::system("Use metric units."),
            Message::user("Weather in Paris?"),
            MessageBuilder::new(nail_core::Role::Assistant, "")
                .with_tool_call("call_abc", "get_weather", r#"{"city":"Paris"}"#)
                .build(),
            Message::tool("call_abc", "18C, cloudy"),
            Message::user("Thanks!"),
        ],
    )
    .with_tool(weather_tool())
    .with_tool_choice(ToolChoice::Required)
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

#[test]
fn test_openai_encode_tool_conversation() {
    let payload = OpenAITranslator::new().encode(&tool_conversation()).unwrap();

    assert_eq!(payload["messages"].as_array().unwrap().len(), 6);
    assert_eq!(payload["messages"][3]["role"], "assistant");
    assert!(payload["messages"][3].get("content").is_none());
    assert_eq!(
        payload["messages"][3]["tool_calls"][0]["function"]["name"],
        "get_weather"
    );
    assert_eq!(payload["messages"][4]["tool_call_id"], "call_abc");
    assert_eq!(payload["tools"][0]["type"], "function");
    assert_eq!(payload["tool_choice"], "required");
    assert!(payload.get("stream").is_none());
}

#[test]
fn test_openai_encode_streaming_requests_usage() {
    let request = ChatRequest::new("gpt-4o", vec![Message::user("hi")]);
    let payload = OpenAITranslator::new().encode_streaming(&request).unwrap();

    assert_eq!(payload["stream"], true);
    assert_eq!(payload["stream_options"]["include_usage"], true);
}

#[test]
fn test_openai_encode_structured_output_and_penalties() {
    let schema = json!({
        "type": "object",
        "properties": {"city": {"type": "string"}},
        "required": ["city"]
    });
    let request = ChatRequest::new("gpt-4o", vec![Message::user("Where is the Louvre?")])
        .with_frequency_penalty(0.5)
        .with_presence_penalty(-1.0)
        .with_response_format(ResponseFormat::JsonSchema {
            name: "place".into(),
            description: None,
            schema: schema.clone(),
            strict: Some(true),
        });

    let payload = OpenAITranslator::new().encode(&request).unwrap();
    assert_eq!(payload["frequency_penalty"], 0.5);
    assert_eq!(payload["presence_penalty"], -1.0);
    assert_eq!(payload["response_format"]["type"], "json_schema");
    assert_eq!(payload["response_format"]["json_schema"]["name"], "place");
    assert_eq!(payload["response_format"]["json_schema"]["schema"], schema);
    assert_eq!(payload["response_format"]["json_schema"]["strict"], true);

    let plain = ChatRequest::new("gpt-4o", vec![Message::user("hi")]);
    let payload = OpenAITranslator::new().encode(&plain).unwrap();
    assert!(payload.get("response_format").is_none());
    assert!(payload.get("frequency_penalty").is_none());
}

#[test]
fn test_openai_decode_tool_call() {
    let response = OpenAITranslator::new()
        .decode(OPENAI_TOOL_RESPONSE.as_bytes())
        .unwrap();

    assert_eq!(response.finish_reason, FinishReason::ToolCall);
    assert_eq!(response.usage.input_tokens, 82);
    assert_eq!(response.usage.output_tokens, 17);
    assert_eq!(response.tool_calls()[0].name, "get_weather");
    assert_eq!(response.tool_calls()[0].arguments, r#"{"city":"Paris"}"#);
}

#[test]
fn test_openai_refusal_is_content_filter() {
    let response = OpenAITranslator::new()
        .decode(OPENAI_REFUSAL_RESPONSE.as_bytes())
        .unwrap();

    assert_eq!(response.finish_reason, FinishReason::ContentFilter);
    assert_eq!(response.text().as_deref(), Some("I can't help with that."));
}

#[test]
fn test_openai_image_on_assistant_is_encoding_error() {
    let request = ChatRequest::new(
        "gpt-4o",
        vec![
            Message::user("describe"),
            MessageBuilder::with_parts(
                nail_core::Role::Assistant,
                vec![ContentPart::ImageUrl {
                    url: "https://example.com/cat.png".into(),
                }],
            )
            .build(),
        ],
    );

    match OpenAITranslator::new().encode(&request).unwrap_err() {
        NailError::Encoding { field, .. } => assert_eq!(field, "messages[1].content"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_openai_decode_reports_position_of_bad_payload() {
    let err = OpenAITranslator::new().decode(b"{\"id\": 42}").unwrap_err();
    match err {
        NailError::Decoding { provider, message } => {
            assert_eq!(provider, "openai");
            assert!(message.contains("line 1"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test_case("stop" => FinishReason::Stop)]
#[test_case("length" => FinishReason::Length)]
#[test_case("tool_calls" => FinishReason::ToolCall)]
#[test_case("function_call" => FinishReason::ToolCall)]
#[test_case("content_filter" => FinishReason::ContentFilter)]
#[test_case("something_new" => FinishReason::Error)]
fn test_openai_finish_reason_mapping(reason: &str) -> FinishReason {
    map_finish_reason(reason)
}

// ---------------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------------

#[test]
fn test_anthropic_encode_tool_conversation() {
    let payload = AnthropicTranslator::new()
        .encode(&tool_conversation())
        .unwrap();

    assert_eq!(payload["system"], "Be brief.\n\nUse metric units.");
    assert_eq!(payload["max_tokens"], 1024);
    assert_eq!(payload["tool_choice"]["type"], "any");
    assert_eq!(payload["tools"][0]["input_schema"]["required"][0], "city");

    let messages = payload["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["content"][0]["type"], "tool_use");
    assert_eq!(messages[1]["content"][0]["input"]["city"], "Paris");

    // The tool result and the following user turn share one user message.
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[2]["content"][0]["type"], "tool_result");
    assert_eq!(messages[2]["content"][0]["tool_use_id"], "call_abc");
    assert_eq!(messages[2]["content"][1]["text"], "Thanks!");
}

#[test]
fn test_anthropic_explicit_max_tokens_wins() {
    let request = ChatRequest::new("claude", vec![Message::user("hi")]).with_max_tokens(50);
    let translator = AnthropicTranslator::new().with_default_max_tokens(4096);

    assert_eq!(translator.encode(&request).unwrap()["max_tokens"], 50);
    let unset = ChatRequest::new("claude", vec![Message::user("hi")]);
    assert_eq!(translator.encode(&unset).unwrap()["max_tokens"], 4096);
}

#[test]
fn test_anthropic_late_system_message_is_encoding_error() {
    let request = ChatRequest::new(
        "claude",
        vec![Message::user("hi"), Message::system("late")],
    );

    match AnthropicTranslator::new().encode(&request).unwrap_err() {
        NailError::Encoding { field, .. } => assert_eq!(field, "messages[1].role"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_anthropic_invalid_tool_arguments_name_the_field() {
    let request = ChatRequest::new(
        "claude",
        vec![
            Message::user("go"),
            MessageBuilder::new(nail_core::Role::Assistant, "")
                .with_tool_call("t1", "run", "not json")
                .build(),
        ],
    );

    match AnthropicTranslator::new().encode(&request).unwrap_err() {
        NailError::Encoding { field, .. } => {
            assert_eq!(field, "messages[1].tool_calls[0].arguments")
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_anthropic_decode_text_and_tool_use() {
    let response = AnthropicTranslator::new()
        .decode(ANTHROPIC_RESPONSE.as_bytes())
        .unwrap();

    assert_eq!(response.finish_reason, FinishReason::ToolCall);
    assert_eq!(response.text().as_deref(), Some("Let me check. "));
    let arguments: serde_json::Value =
        serde_json::from_str(&response.tool_calls()[0].arguments).unwrap();
    assert_eq!(arguments, json!({"city": "Paris"}));
    assert_eq!(response.usage.total_tokens(), 165);
}

#[test]
fn test_anthropic_missing_stop_reason_is_decoding_error() {
    let body = ANTHROPIC_RESPONSE.replace(r#""stop_reason": "tool_use""#, r#""stop_reason": null"#);
    let err = AnthropicTranslator::new().decode(body.as_bytes()).unwrap_err();
    assert!(matches!(err, NailError::Decoding { .. }));
}

#[test_case("end_turn" => FinishReason::Stop)]
#[test_case("stop_sequence" => FinishReason::Stop)]
#[test_case("max_tokens" => FinishReason::Length)]
#[test_case("tool_use" => FinishReason::ToolCall)]
#[test_case("refusal" => FinishReason::ContentFilter)]
#[test_case("pause_turn" => FinishReason::Error)]
fn test_anthropic_stop_reason_mapping(reason: &str) -> FinishReason {
    map_stop_reason(reason)
}

// ---------------------------------------------------------------------------
// Chutes
// ---------------------------------------------------------------------------

#[test]
fn test_chutes_encode_plain_and_wrapped() {
    let request = ChatRequest::new("deepseek-ai/DeepSeek-V3", vec![Message::user("hi")])
        .with_stop_sequence("END")
        .with_seed(42);

    let plain = ChutesTranslator::new().encode(&request).unwrap();
    assert_eq!(plain["stop"], "END");
    assert_eq!(plain["seed"], 42);

    let wrapped = ChutesTranslator::new()
        .with_invocation_wrapper()
        .encode(&request)
        .unwrap();
    assert_eq!(wrapped["input_args"]["model"], "deepseek-ai/DeepSeek-V3");
    assert_eq!(ChutesTranslator::new().with_invocation_wrapper().chat_path(), "");
}

#[test]
fn test_chutes_encode_json_mode_and_penalties() {
    let request = ChatRequest::new("m", vec![Message::user("list three colors as JSON")])
        .with_presence_penalty(0.5)
        .with_response_format(ResponseFormat::JsonObject);

    let wrapped = ChutesTranslator::new()
        .with_invocation_wrapper()
        .encode(&request)
        .unwrap();
    assert_eq!(wrapped["input_args"]["response_format"], json!({"type": "json_object"}));
    assert_eq!(wrapped["input_args"]["presence_penalty"], 0.5);

    let schema = request.with_response_format(ResponseFormat::json_schema(
        "colors",
        json!({"type": "array"}),
    ));
    let plain = ChutesTranslator::new().encode(&schema).unwrap();
    assert_eq!(plain["response_format"]["json_schema"]["name"], "colors");
    assert!(plain["response_format"]["json_schema"].get("strict").is_none());
}

#[test]
fn test_anthropic_refuses_structured_output_before_encoding() {
    let request = ChatRequest::new("claude-sonnet-4", vec![Message::user("hi")])
        .with_response_format(ResponseFormat::JsonObject)
        .with_frequency_penalty(0.2);
    let caps = AnthropicTranslator::new().capabilities();

    assert_eq!(
        caps.check("claude", &request, false),
        Err(NailError::unsupported("claude", "penalties"))
    );
    let without_penalty = ChatRequest {
        frequency_penalty: None,
        ..request
    };
    assert_eq!(
        caps.check("claude", &without_penalty, false),
        Err(NailError::unsupported("claude", "response_format"))
    );
}

#[test]
fn test_chutes_rejects_tools() {
    let request = ChatRequest::new("m", vec![Message::user("hi")]).with_tool(weather_tool());
    match ChutesTranslator::new().encode(&request).unwrap_err() {
        NailError::Encoding { provider, field, .. } => {
            assert_eq!(provider, "chutes");
            assert_eq!(field, "tools");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_chutes_decodes_openai_shape() {
    let response = ChutesTranslator::new()
        .decode(OPENAI_TOOL_RESPONSE.as_bytes())
        .unwrap();
    assert_eq!(response.provider, "chutes");
    assert_eq!(response.finish_reason, FinishReason::ToolCall);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

const CLOSED_SET: [FinishReason; 5] = [
    FinishReason::Stop,
    FinishReason::Length,
    FinishReason::ToolCall,
    FinishReason::ContentFilter,
    FinishReason::Error,
];

proptest! {
    #[test]
    fn prop_finish_reasons_stay_in_closed_set(reason in "\\PC{0,24}") {
        prop_assert!(CLOSED_SET.contains(&map_finish_reason(&reason)));
        prop_assert!(CLOSED_SET.contains(&map_stop_reason(&reason)));
    }

    #[test]
    fn prop_openai_usage_and_text_survive_decoding(
        prompt in any::<u32>(),
        completion in any::<u32>(),
        text in "[a-zA-Z0-9 .,!?]{1,64}",
        reason in prop::sample::select(vec!["stop", "length", "content_filter", "tool_calls"]),
    ) {
        let body = json!({
            "id": "c",
            "model": "m",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": text},
                "finish_reason": reason,
            }],
            "usage": {"prompt_tokens": prompt, "completion_tokens": completion},
        });

        let response = OpenAITranslator::new()
            .decode(body.to_string().as_bytes())
            .unwrap();
        prop_assert_eq!(response.usage.input_tokens, prompt);
        prop_assert_eq!(response.usage.output_tokens, completion);
        prop_assert_eq!(response.finish_reason, map_finish_reason(reason));
        prop_assert_eq!(&response.choices[0].message.content, &MessageContent::Text(text));
    }

    #[test]
    fn prop_anthropic_usage_survives_decoding(input in any::<u32>(), output in any::<u32>()) {
        let body = json!({
            "id": "msg",
            "type": "message",
            "role": "assistant",
            "model": "claude",
            "content": [{"type": "text", "text": "ok"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": input, "output_tokens": output},
        });

        let response = AnthropicTranslator::new()
            .decode(body.to_string().as_bytes())
            .unwrap();
        prop_assert_eq!(response.usage.input_tokens, input);
        prop_assert_eq!(response.usage.output_tokens, output);
    }
}
