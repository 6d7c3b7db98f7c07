//! NAIL Core Library
//!
//! One request/response contract over many LLM providers. Callers build a
//! [`ChatRequest`], pick a provider identifier and hand both to
//! [`NailClient`]; translators map the request onto each provider's wire
//! format and map the answer back.
//!
//! ```no_run
//! use nail_core::{ChatRequest, Message, NailClient, NailConfig, ProviderRegistry};
//! use nail_core::transport::HttpTransport;
//! use std::sync::Arc;
//!
//! # async fn run(yaml: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let config = NailConfig::from_yaml_str(yaml)?;
//! let transport = Arc::new(HttpTransport::with_config(
//!     config.connection.connect_timeout(),
//!     config.connection.max_idle_per_host,
//! )?);
//! let registry = ProviderRegistry::from_config(&config, transport)?;
//! let client = NailClient::new(Arc::new(registry));
//!
//! let request = ChatRequest::new("gpt-4o-mini", vec![Message::user("Hello")]);
//! let response = client.invoke(&request, "openai").await?;
//! println!("{}", response.text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod providers;
pub mod translators;
pub mod transport;

pub use capabilities::{Capabilities, Feature};
pub use client::NailClient;
pub use config::{NailConfig, ProviderConfig, ProviderKind, SecretString};
pub use error::{ErrorKind, NailError, NailResult};
pub use events::{EventSink, MemorySink, NailEvent, NoopSink, TracingSink};
pub use protocol::{
    ChatRequest, ChatResponse, Choice, ContentPart, FinishReason, Message, MessageContent,
    ResponseFormat, Role, StreamFragment, ToolCall, ToolChoice, ToolDefinition, Usage,
};
pub use providers::{Adapter, HttpAdapter, ProviderId, ProviderRegistry, ResponseStream};
pub use translators::Translator;

/// Returns the version of the NAIL core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
