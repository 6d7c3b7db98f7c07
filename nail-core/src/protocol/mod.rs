//! Protocol module for provider-agnostic request/response structures
//!
//! This module defines the common API vocabulary. The structures are:
//! - Provider-agnostic
//! - Immutable once handed to the library (every layer borrows them)
//! - Closed over roles and finish reasons
//! - Serializable, so requests can be built from JSON

pub mod types;
mod validation;

pub use types::{
    ChatRequest, ChatResponse, Choice, ContentPart, FinishReason, Message, MessageContent,
    ResponseFormat, Role, StreamFragment, ToolCall, ToolChoice, ToolDefinition, Usage,
};

// Re-export common traits for convenience
pub use types::{IntoMessage, MessageBuilder};
