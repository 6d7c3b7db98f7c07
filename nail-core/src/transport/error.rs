//! HTTP error mapping utilities

use crate::error::NailError;
use serde_json::Value;
use uuid::Uuid;

/// Longest error body excerpt kept in a message
const MAX_ERROR_EXCERPT: usize = 512;

/// Map a non-success HTTP status and response body to a [`NailError`].
///
/// 408 and 504 become [`NailError::Timeout`]; everything else is a
/// [`NailError::Transport`] carrying the status and the provider's own
/// error message when one can be found in the body.
pub fn map_http_error(status: u16, body: Option<String>, request_id: Uuid) -> NailError {
    let error_message = body
        .as_deref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_message(&v))
        .or_else(|| body.as_deref().map(excerpt).filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| format!("HTTP error {}", status));

    let message_with_id = format!("{} [request_id: {}]", error_message, request_id);

    match status {
        408 | 504 => NailError::Timeout(message_with_id),
        _ => NailError::Transport {
            status: Some(status),
            message: message_with_id,
        },
    }
}

/// Extract a human-readable message from common provider error bodies
fn extract_error_message(json: &Value) -> Option<String> {
    // OpenAI and Anthropic: { "error": { "message": "...", "type": "..." } }
    if let Some(error) = json.get("error") {
        if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
            return Some(match error.get("type").and_then(|v| v.as_str()) {
                Some(kind) => format!("{}: {}", kind, message),
                None => message.to_string(),
            });
        }
        if let Some(message) = error.as_str() {
            return Some(message.to_string());
        }
    }

    // vLLM / generic: { "message": "..." } or { "detail": "..." }
    for key in ["message", "detail"] {
        if let Some(message) = json.get(key).and_then(|v| v.as_str()) {
            return Some(message.to_string());
        }
    }

    None
}

fn excerpt(body: &str) -> String {
    if body.len() <= MAX_ERROR_EXCERPT {
        return body.to_string();
    }
    let mut end = MAX_ERROR_EXCERPT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_error_body() {
        let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
        let err = map_http_error(401, Some(body.to_string()), Uuid::nil());
        match err {
            NailError::Transport { status, message } => {
                assert_eq!(status, Some(401));
                assert!(message.starts_with("invalid_request_error: Invalid API key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_gateway_timeout_is_timeout() {
        let err = map_http_error(504, None, Uuid::nil());
        assert!(matches!(err, NailError::Timeout(_)));
    }

    #[test]
    fn test_plain_text_body_is_kept() {
        let err = map_http_error(502, Some("bad gateway".into()), Uuid::nil());
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn test_long_body_is_truncated() {
        let err = map_http_error(500, Some("x".repeat(4096)), Uuid::nil());
        assert!(err.to_string().len() < 1024);
    }
}
