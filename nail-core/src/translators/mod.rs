//! Schema translators
//!
//! A translator owns the bidirectional mapping between the common
//! [`ChatRequest`]/[`ChatResponse`] shapes and one provider's wire format.
//! Translators are pure: they never touch the network and hold no mutable
//! state, so one instance can serve any number of concurrent calls.
//!
//! Encoding only sees requests that already passed the provider's
//! capability check. If a translator still meets a field it cannot
//! express, it fails with [`NailError::Encoding`] rather than dropping it.

pub mod anthropic;
pub mod chutes;
pub mod openai;

use crate::capabilities::Capabilities;
use crate::config::SecretString;
use crate::error::{NailError, NailResult};
use crate::protocol::{ChatRequest, ChatResponse, StreamFragment};
use serde::de::DeserializeOwned;

pub use anthropic::AnthropicTranslator;
pub use chutes::ChutesTranslator;
pub use openai::OpenAITranslator;

/// A provider-native request or response body
pub type NativePayload = serde_json::Value;

/// Bidirectional mapping between the common shapes and one wire format
pub trait Translator: Send + Sync {
    /// Short wire-format name used in errors ("openai", "anthropic", ...)
    fn name(&self) -> &str;

    /// Features this wire format can carry
    fn capabilities(&self) -> Capabilities;

    /// Base URL used when the caller configures none
    fn default_base_url(&self) -> &str;

    /// Path of the chat endpoint, appended to the base URL
    fn chat_path(&self) -> &str;

    /// Provider authentication and versioning headers
    fn auth_headers(&self, credential: &SecretString) -> Vec<(String, String)>;

    /// Convert a request to the native payload for a single-shot call
    fn encode(&self, request: &ChatRequest) -> NailResult<NativePayload>;

    /// Convert a request to the native payload for a streaming call
    fn encode_streaming(&self, request: &ChatRequest) -> NailResult<NativePayload>;

    /// Convert a native response body to the common shape
    fn decode(&self, body: &[u8]) -> NailResult<ChatResponse>;

    /// Convert one server-sent event to zero or more fragments.
    ///
    /// `event` is the SSE event name, `"message"` when the server sends none.
    fn decode_stream_event(&self, event: &str, data: &str) -> NailResult<Vec<StreamFragment>>;
}

/// Deserialize a native body, reporting shape mismatches as decoding errors
pub(crate) fn parse_native<T: DeserializeOwned>(provider: &str, body: &[u8]) -> NailResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        NailError::decoding(
            provider,
            format!(
                "unexpected payload at line {}, column {}: {}",
                e.line(),
                e.column(),
                e
            ),
        )
    })
}

/// Serialize a typed native request into a payload
pub(crate) fn to_payload<T: serde::Serialize>(provider: &str, native: &T) -> NailResult<NativePayload> {
    serde_json::to_value(native)
        .map_err(|e| NailError::encoding(provider, "<payload>", e.to_string()))
}

/// Parse a `data:<media type>;base64,<data>` URL into its parts
pub(crate) fn split_data_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let media_type = meta.strip_suffix(";base64")?;
    Some((media_type.to_string(), data.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_data_url() {
        assert_eq!(
            split_data_url("data:image/png;base64,AAAA"),
            Some(("image/png".to_string(), "AAAA".to_string()))
        );
        assert_eq!(split_data_url("https://example.com/cat.png"), None);
        assert_eq!(split_data_url("data:image/png,AAAA"), None);
    }

    #[test]
    fn test_parse_native_reports_decoding_error() {
        let err = parse_native::<serde_json::Value>("openai", b"{not json").unwrap_err();
        assert!(matches!(err, NailError::Decoding { provider, .. } if provider == "openai"));
    }
}
