//! Structural validation of common-API requests

use super::types::{ChatRequest, MessageContent, ResponseFormat, Role, ToolChoice};
use crate::error::{NailError, NailResult};
use std::collections::HashSet;

impl ChatRequest {
    /// Parse a request from JSON and validate it.
    ///
    /// Unknown role tags and other shape errors surface as
    /// [`NailError::InvalidRequest`].
    pub fn from_json(json: &str) -> NailResult<Self> {
        let request: ChatRequest = serde_json::from_str(json)
            .map_err(|e| NailError::InvalidRequest(format!("malformed request: {}", e)))?;
        request.validate()?;
        Ok(request)
    }

    /// Check that the request is structurally well formed.
    ///
    /// This does not look at provider capabilities; see
    /// [`crate::capabilities::Capabilities::check`].
    pub fn validate(&self) -> NailResult<()> {
        if self.model.trim().is_empty() {
            return Err(invalid("model must not be empty"));
        }
        if self.messages.is_empty() {
            return Err(invalid("messages must not be empty"));
        }

        if let Some(t) = self.temperature {
            if !t.is_finite() || !(0.0..=2.0).contains(&t) {
                return Err(invalid(format!(
                    "temperature must be between 0.0 and 2.0, got {}",
                    t
                )));
            }
        }
        if let Some(p) = self.top_p {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(invalid(format!(
                    "top_p must be between 0.0 and 1.0, got {}",
                    p
                )));
            }
        }
        for (name, penalty) in [
            ("frequency_penalty", self.frequency_penalty),
            ("presence_penalty", self.presence_penalty),
        ] {
            if let Some(v) = penalty {
                if !v.is_finite() || !(-2.0..=2.0).contains(&v) {
                    return Err(invalid(format!(
                        "{} must be between -2.0 and 2.0, got {}",
                        name, v
                    )));
                }
            }
        }
        if self.max_tokens == Some(0) {
            return Err(invalid("max_tokens must be greater than zero"));
        }
        if let Some(stop) = &self.stop {
            if stop.iter().any(|s| s.is_empty()) {
                return Err(invalid("stop sequences must not be empty strings"));
            }
        }

        for (i, message) in self.messages.iter().enumerate() {
            match message.role {
                Role::System | Role::User => {
                    if message.content.is_empty() {
                        return Err(invalid(format!(
                            "messages[{}]: {} message has no content",
                            i,
                            message.role.as_str()
                        )));
                    }
                    if !message.tool_calls.is_empty() {
                        return Err(invalid(format!(
                            "messages[{}]: only assistant messages may carry tool calls",
                            i
                        )));
                    }
                }
                Role::Assistant => {
                    if message.content.is_empty() && message.tool_calls.is_empty() {
                        return Err(invalid(format!(
                            "messages[{}]: assistant message needs content or tool calls",
                            i
                        )));
                    }
                }
                Role::Tool => {
                    if message.tool_call_id.as_deref().map_or(true, str::is_empty) {
                        return Err(invalid(format!(
                            "messages[{}]: tool message requires tool_call_id",
                            i
                        )));
                    }
                    if let MessageContent::Parts(parts) = &message.content {
                        if parts.iter().any(|p| p.is_image()) {
                            return Err(invalid(format!(
                                "messages[{}]: tool results must be text",
                                i
                            )));
                        }
                    }
                }
            }
            for call in &message.tool_calls {
                if call.id.is_empty() || call.name.is_empty() {
                    return Err(invalid(format!(
                        "messages[{}]: tool calls need an id and a name",
                        i
                    )));
                }
            }
        }

        let mut names = HashSet::new();
        if let Some(tools) = &self.tools {
            for tool in tools {
                if tool.name.trim().is_empty() {
                    return Err(invalid("tool definitions must have a name"));
                }
                if !names.insert(tool.name.as_str()) {
                    return Err(invalid(format!("duplicate tool name '{}'", tool.name)));
                }
                if !tool.parameters.is_object() {
                    return Err(invalid(format!(
                        "tool '{}': parameters must be a JSON Schema object",
                        tool.name
                    )));
                }
            }
        }
        if let Some(ToolChoice::Tool { name }) = &self.tool_choice {
            if !names.contains(name.as_str()) {
                return Err(invalid(format!(
                    "tool_choice names undefined tool '{}'",
                    name
                )));
            }
        }

        if let Some(ResponseFormat::JsonSchema { name, schema, .. }) = &self.response_format {
            if name.trim().is_empty() {
                return Err(invalid("response_format: json_schema needs a name"));
            }
            if !schema.is_object() {
                return Err(invalid(format!(
                    "response_format '{}': schema must be a JSON Schema object",
                    name
                )));
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> NailError {
    NailError::InvalidRequest(message.into())
}
