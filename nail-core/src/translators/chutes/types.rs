//! Chutes (vLLM-compatible) request types
//!
//! Responses follow the OpenAI shape and reuse [`crate::translators::openai::types`].

use serde::{Deserialize, Serialize};

/// Chat request accepted by the Chutes OpenAI-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChutesChatRequest {
    pub model: String,
    pub messages: Vec<ChutesMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequence>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ChutesResponseFormat>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Chutes messages carry plain text only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChutesMessage {
    pub role: String,
    pub content: String,
}

/// One stop string or several
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequence {
    Single(String),
    Array(Vec<String>),
}

/// Output format, served by vLLM guided decoding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChutesResponseFormat {
    Text,
    JsonObject,
    JsonSchema { json_schema: ChutesJsonSchema },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChutesJsonSchema {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub schema: serde_json::Value,

    /// vLLM treats an absent flag as non-strict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Envelope for the generic chute function endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChutesInvocation {
    pub input_args: ChutesChatRequest,
}
