//! Provider adapter trait and the HTTP-backed implementation
//!
//! An adapter binds one provider identifier to a translator, a transport
//! and a credential. Callers normally reach adapters through
//! [`crate::NailClient`], which validates requests first; adapters assume
//! the request already passed the capability check and never retry.

use super::streaming::{decode_sse, ResponseStream};
use crate::capabilities::Capabilities;
use crate::config::{ConnectionConfig, ProviderConfig, ProviderKind, SecretString};
use crate::error::{NailError, NailResult};
use crate::protocol::{ChatRequest, ChatResponse};
use crate::translators::{
    AnthropicTranslator, ChutesTranslator, NativePayload, OpenAITranslator, Translator,
};
use crate::transport::{Transport, TransportRequest, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Core provider trait that all adapters implement
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Identifier this adapter is registered under
    fn id(&self) -> &str;

    /// What the provider can carry
    fn capabilities(&self) -> &Capabilities;

    /// Send a request and return the complete response
    async fn send(&self, request: &ChatRequest) -> NailResult<ChatResponse>;

    /// Open a streaming response.
    ///
    /// The returned stream stops with [`NailError::Cancelled`] once `cancel`
    /// fires.
    async fn send_stream(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> NailResult<ResponseStream>;
}

/// Adapter that speaks a provider's wire format over a [`Transport`]
pub struct HttpAdapter {
    id: String,
    translator: Arc<dyn Translator>,
    transport: Arc<dyn Transport>,
    credential: SecretString,
    base_url: String,
    capabilities: Capabilities,
    timeout: Duration,
}

impl HttpAdapter {
    /// Create an adapter using the translator's default endpoint and capabilities
    pub fn new(
        id: impl Into<String>,
        translator: Arc<dyn Translator>,
        transport: Arc<dyn Transport>,
        credential: SecretString,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: translator.default_base_url().to_string(),
            capabilities: translator.capabilities(),
            translator,
            transport,
            credential,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build an adapter from a provider configuration entry
    pub fn from_config(
        config: &ProviderConfig,
        connection: &ConnectionConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let translator: Arc<dyn Translator> = match config.kind {
            ProviderKind::OpenAI => Arc::new(OpenAITranslator::new()),
            ProviderKind::Anthropic => {
                let mut translator = AnthropicTranslator::new();
                if let Some(max_tokens) = config.default_max_tokens {
                    translator = translator.with_default_max_tokens(max_tokens);
                }
                Arc::new(translator)
            }
            ProviderKind::Chutes => {
                let translator = ChutesTranslator::new();
                if config.wrap_invocation {
                    Arc::new(translator.with_invocation_wrapper())
                } else {
                    Arc::new(translator)
                }
            }
        };

        let mut adapter = Self::new(&config.id, translator, transport, config.api_key.clone())
            .with_timeout(config.timeout(connection));
        if let Some(base_url) = &config.base_url {
            adapter = adapter.with_base_url(base_url);
        }
        if let Some(capabilities) = &config.capabilities {
            adapter = adapter.with_capabilities(capabilities.clone());
        }
        adapter
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the translator's capability descriptor
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn translator(&self) -> &Arc<dyn Translator> {
        &self.translator
    }

    /// Full URL of the chat endpoint
    pub fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.translator.chat_path()
        )
    }

    fn build_request(&self, payload: &NativePayload) -> NailResult<TransportRequest> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| NailError::encoding(self.translator.name(), "<payload>", e.to_string()))?;

        Ok(TransportRequest::new(self.endpoint(), body)
            .with_headers(self.translator.auth_headers(&self.credential))
            .with_timeout(self.timeout)
            .with_request_id(Uuid::new_v4()))
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn send(&self, request: &ChatRequest) -> NailResult<ChatResponse> {
        let payload = self.translator.encode(request)?;
        let transport_request = self.build_request(&payload)?;
        debug!(
            "Sending to provider '{}' model '{}' [request_id: {}]",
            self.id, request.model, transport_request.request_id
        );

        let request_id = transport_request.request_id;
        let response = self.transport.send(transport_request).await?;

        let mut decoded = self.translator.decode(&response.body).inspect_err(|e| {
            warn!("Undecodable response from '{}' [request_id: {}]: {}", self.id, request_id, e);
        })?;
        decoded.provider = self.id.clone();
        Ok(decoded)
    }

    async fn send_stream(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> NailResult<ResponseStream> {
        let payload = self.translator.encode_streaming(request)?;
        let transport_request = self
            .build_request(&payload)?
            .with_header("Accept", "text/event-stream");
        debug!(
            "Opening stream to provider '{}' model '{}' [request_id: {}]",
            self.id, request.model, transport_request.request_id
        );

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(NailError::Cancelled),
            opened = self.transport.send_streaming(transport_request) => opened?,
        };

        Ok(ResponseStream::new(
            self.id.clone(),
            request.model.clone(),
            decode_sse(bytes, Arc::clone(&self.translator)),
            cancel,
        ))
    }
}

impl std::fmt::Debug for HttpAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAdapter")
            .field("id", &self.id)
            .field("translator", &self.translator.name())
            .field("base_url", &self.base_url)
            .field("credential", &self.credential)
            .field("timeout", &self.timeout)
            .finish()
    }
}
