//! End-to-end tests of the common API over stub transports

mod common;

use common::{sse, StubTransport, OPENAI_STOP};
use futures::StreamExt;
use nail_core::translators::{AnthropicTranslator, OpenAITranslator};
use nail_core::{
    Capabilities, ChatRequest, ErrorKind, FinishReason, HttpAdapter, MemorySink, Message,
    NailClient, NailError, NailEvent, ProviderRegistry, SecretString, ToolDefinition,
};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn openai_adapter(id: &str, transport: Arc<StubTransport>) -> Arc<HttpAdapter> {
    Arc::new(
        HttpAdapter::new(
            id,
            Arc::new(OpenAITranslator::new()),
            transport,
            SecretString::new("sk-test"),
        )
        .with_base_url("http://stub.local/v1"),
    )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn hello() -> ChatRequest {
    ChatRequest::new("x", vec![Message::user("hi")])
}

#[tokio::test]
async fn test_invoke_registered_and_unknown_providers() {
    init_tracing();
    let transport = Arc::new(StubTransport::replying(OPENAI_STOP));
    let registry = ProviderRegistry::new();
    registry
        .register("alpha", openai_adapter("alpha", Arc::clone(&transport)))
        .unwrap();
    registry
        .register("beta", openai_adapter("beta", Arc::clone(&transport)))
        .unwrap();
    let client = NailClient::new(Arc::new(registry));

    let response = client.invoke(&hello(), "alpha").await.unwrap();
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.provider, "alpha");
    assert!(!response.text().unwrap_or_default().is_empty());

    let err = client.invoke(&hello(), "gamma").await.unwrap_err();
    assert_eq!(err, NailError::UnknownProvider("gamma".into()));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_unsupported_feature_never_reaches_transport() {
    let transport = Arc::new(StubTransport::replying(OPENAI_STOP));
    let adapter = HttpAdapter::new(
        "plain",
        Arc::new(OpenAITranslator::new()),
        transport.clone(),
        SecretString::new("sk-test"),
    )
    .with_capabilities(Capabilities::default());
    let registry = ProviderRegistry::new();
    registry.register("plain", Arc::new(adapter)).unwrap();
    let client = NailClient::new(Arc::new(registry));

    let request = hello().with_tool(ToolDefinition::new(
        "lookup",
        json!({"type": "object", "properties": {"q": {"type": "string"}}}),
    ));
    let err = client.invoke(&request, "plain").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_lookup() {
    let client = NailClient::new(Arc::new(ProviderRegistry::new()));
    let request = ChatRequest::new("x", vec![]);

    // Validation runs first, so an empty request never reports the unknown provider.
    let err = client.invoke(&request, "nowhere").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn test_encoding_error_surfaces_field() {
    let transport = Arc::new(StubTransport::replying("{}"));
    let adapter = HttpAdapter::new(
        "claude",
        Arc::new(AnthropicTranslator::new()),
        transport.clone(),
        SecretString::new("sk-ant"),
    )
    .with_capabilities(Capabilities::all());
    let registry = ProviderRegistry::new();
    registry.register("claude", Arc::new(adapter)).unwrap();
    let client = NailClient::new(Arc::new(registry));

    let err = client.invoke(&hello().with_seed(7), "claude").await.unwrap_err();
    match err {
        NailError::Encoding { provider, field, .. } => {
            assert_eq!(provider, "anthropic");
            assert_eq!(field, "seed");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_undecodable_response_is_an_error_not_a_default() {
    let transport = Arc::new(StubTransport::replying(
        r#"{"id":"c","model":"m","choices":[{"index":0,"message":{"role":"assistant","content":"cut"}}],
            "usage":{"prompt_tokens":1,"completion_tokens":1}}"#,
    ));
    let registry = ProviderRegistry::new();
    registry.register("alpha", openai_adapter("alpha", transport)).unwrap();
    let client = NailClient::new(Arc::new(registry));

    let err = client.invoke(&hello(), "alpha").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decoding);
}

#[tokio::test]
async fn test_events_follow_each_call() {
    init_tracing();
    let transport = Arc::new(StubTransport::replying(OPENAI_STOP));
    let registry = ProviderRegistry::new();
    registry.register("alpha", openai_adapter("alpha", transport)).unwrap();
    let sink = MemorySink::default();
    let client = NailClient::new(Arc::new(registry)).with_sink(Arc::new(sink.clone()));

    client.invoke(&hello(), "alpha").await.unwrap();
    client.invoke(&hello(), "gamma").await.unwrap_err();

    let events = sink.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        NailEvent::RequestIssued { provider, streaming: false, .. } if provider == "alpha"
    ));
    match &events[1] {
        NailEvent::ResponseReceived {
            finish_reason,
            usage,
            ..
        } => {
            assert_eq!(*finish_reason, FinishReason::Stop);
            assert_eq!(usage.output_tokens, 3);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(events[0].request_id(), events[1].request_id());
    assert!(matches!(
        &events[2],
        NailEvent::Failed { kind: ErrorKind::UnknownProvider, .. }
    ));
}

#[tokio::test]
async fn test_invoke_stream_collects_fragments() {
    let transport = Arc::new(StubTransport::streaming([
        sse(r#"{"id":"c1","model":"gpt-4o","choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#),
        sse(r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#),
        sse(r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"lo"},"finish_reason":"length"}]}"#),
        sse(r#"{"id":"c1","choices":[],"usage":{"prompt_tokens":5,"completion_tokens":2}}"#),
        sse("[DONE]"),
    ]));
    let registry = ProviderRegistry::new();
    registry
        .register("alpha", openai_adapter("alpha", transport.clone()))
        .unwrap();
    let sink = MemorySink::default();
    let client = NailClient::new(Arc::new(registry)).with_sink(Arc::new(sink.clone()));

    let stream = client
        .invoke_stream(&hello(), "alpha", CancellationToken::new())
        .await
        .unwrap();
    let response = stream.collect_response().await.unwrap();

    assert_eq!(response.text().as_deref(), Some("Hello"));
    assert_eq!(response.finish_reason, FinishReason::Length);
    assert_eq!(response.model, "gpt-4o");
    assert_eq!(response.usage.input_tokens, 5);
    assert_eq!(transport.open_streams(), 0);
    assert_eq!(
        transport.last_request().unwrap().header("Accept"),
        Some("text/event-stream")
    );
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, NailEvent::StreamOpened { .. })));
}

#[tokio::test]
async fn test_invoke_stream_requires_streaming_capability() {
    let transport = Arc::new(StubTransport::streaming(Vec::<String>::new()));
    let adapter = HttpAdapter::new(
        "batch",
        Arc::new(OpenAITranslator::new()),
        transport.clone(),
        SecretString::new("sk-test"),
    )
    .with_capabilities(Capabilities::default());
    let registry = ProviderRegistry::new();
    registry.register("batch", Arc::new(adapter)).unwrap();
    let client = NailClient::new(Arc::new(registry));

    let err = client
        .invoke_stream(&hello(), "batch", CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, NailError::unsupported("batch", "streaming"));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_fragments_arrive_in_order() {
    let transport = Arc::new(StubTransport::streaming([
        sse(r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#),
        sse(r#"{"choices":[{"index":0,"delta":{"content":"a"}}]}"#),
        sse(r#"{"choices":[{"index":0,"delta":{"content":"b"},"finish_reason":"stop"}]}"#),
    ]));
    let registry = ProviderRegistry::new();
    registry.register("alpha", openai_adapter("alpha", transport)).unwrap();
    let client = NailClient::new(Arc::new(registry));

    let fragments: Vec<_> = client
        .invoke_stream(&hello(), "alpha", CancellationToken::new())
        .await
        .unwrap()
        .collect()
        .await;

    let texts: Vec<String> = fragments
        .into_iter()
        .filter_map(|f| match f.unwrap() {
            nail_core::StreamFragment::TextDelta { text } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(texts, ["a", "b"]);
}
