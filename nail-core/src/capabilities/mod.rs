//! Provider capability descriptors
//!
//! Each adapter carries a static [`Capabilities`] value describing which
//! optional request features it can carry to its provider. Requests are
//! checked against it before any payload is built, so an unsupported
//! feature fails fast with [`NailError::UnsupportedFeature`] instead of
//! being dropped on the way to the wire.

use crate::error::{NailError, NailResult};
use crate::protocol::{ChatRequest, ResponseFormat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Optional request features gated by capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Tool definitions, tool choice, tool calls and tool results
    ToolCalls,
    /// Incremental response delivery
    Streaming,
    /// Messages with the system role
    SystemMessages,
    /// Stop sequences
    StopSequences,
    /// Image content parts
    ImageContent,
    /// Deterministic seed
    Seed,
    /// Nucleus sampling
    TopP,
    /// Frequency and presence penalties
    Penalties,
    /// JSON object output mode
    ResponseFormat,
    /// Schema-constrained JSON output
    JsonSchema,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::ToolCalls => "tool_calls",
            Feature::Streaming => "streaming",
            Feature::SystemMessages => "system_messages",
            Feature::StopSequences => "stop_sequences",
            Feature::ImageContent => "image_content",
            Feature::Seed => "seed",
            Feature::TopP => "top_p",
            Feature::Penalties => "penalties",
            Feature::ResponseFormat => "response_format",
            Feature::JsonSchema => "json_schema",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static capability descriptor for one provider.
///
/// Fields missing from a serialized descriptor take the [`Default`] values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Does the provider support tool calling?
    pub tool_calls: bool,

    /// Does the provider support streaming?
    pub streaming: bool,

    /// Does the provider accept system messages?
    pub system_messages: bool,

    /// Does the provider accept stop sequences?
    pub stop_sequences: bool,

    /// Upper bound on the number of stop sequences, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stop_sequences: Option<usize>,

    /// Does the provider accept image parts?
    pub image_content: bool,

    /// Does the provider accept a sampling seed?
    pub seed: bool,

    /// Does the provider accept top_p?
    pub top_p: bool,

    /// Does the provider accept frequency and presence penalties?
    pub penalties: bool,

    /// Does the provider offer a JSON object output mode?
    pub response_format: bool,

    /// Does the provider constrain output to a JSON Schema?
    pub json_schema: bool,
}

impl Default for Capabilities {
    /// Text-only chat with system messages and stop sequences
    fn default() -> Self {
        Self {
            tool_calls: false,
            streaming: false,
            system_messages: true,
            stop_sequences: true,
            max_stop_sequences: None,
            image_content: false,
            seed: false,
            top_p: true,
            penalties: true,
            response_format: false,
            json_schema: false,
        }
    }
}

impl Capabilities {
    /// Every feature enabled, no limits
    pub fn all() -> Self {
        Self {
            tool_calls: true,
            streaming: true,
            system_messages: true,
            stop_sequences: true,
            max_stop_sequences: None,
            image_content: true,
            seed: true,
            top_p: true,
            penalties: true,
            response_format: true,
            json_schema: true,
        }
    }

    pub fn supports(&self, feature: Feature) -> bool {
        match feature {
            Feature::ToolCalls => self.tool_calls,
            Feature::Streaming => self.streaming,
            Feature::SystemMessages => self.system_messages,
            Feature::StopSequences => self.stop_sequences,
            Feature::ImageContent => self.image_content,
            Feature::Seed => self.seed,
            Feature::TopP => self.top_p,
            Feature::Penalties => self.penalties,
            Feature::ResponseFormat => self.response_format,
            Feature::JsonSchema => self.json_schema,
        }
    }

    /// Features the request relies on, in a stable order
    pub fn required_features(request: &ChatRequest, streaming: bool) -> Vec<Feature> {
        let mut features = Vec::new();
        if request.uses_tools() {
            features.push(Feature::ToolCalls);
        }
        if streaming {
            features.push(Feature::Streaming);
        }
        if request.has_system_message() {
            features.push(Feature::SystemMessages);
        }
        if request.stop.as_ref().is_some_and(|s| !s.is_empty()) {
            features.push(Feature::StopSequences);
        }
        if request.has_images() {
            features.push(Feature::ImageContent);
        }
        if request.seed.is_some() {
            features.push(Feature::Seed);
        }
        if request.top_p.is_some() {
            features.push(Feature::TopP);
        }
        if request.uses_penalties() {
            features.push(Feature::Penalties);
        }
        match request.response_format {
            None | Some(ResponseFormat::Text) => {}
            Some(ResponseFormat::JsonObject) => features.push(Feature::ResponseFormat),
            Some(ResponseFormat::JsonSchema { .. }) => features.push(Feature::JsonSchema),
        }
        features
    }

    /// Reject the request if it needs anything this provider lacks
    pub fn check(&self, provider: &str, request: &ChatRequest, streaming: bool) -> NailResult<()> {
        for feature in Self::required_features(request, streaming) {
            if !self.supports(feature) {
                return Err(NailError::unsupported(provider, feature.as_str()));
            }
        }

        if let (Some(max), Some(stop)) = (self.max_stop_sequences, &request.stop) {
            if stop.len() > max {
                return Err(NailError::unsupported(
                    provider,
                    format!("more than {} stop sequences (got {})", max, stop.len()),
                ));
            }
        }

        Ok(())
    }
}
