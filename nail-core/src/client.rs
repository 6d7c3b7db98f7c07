//! Common API
//!
//! [`NailClient`] is what callers program against. It validates a request,
//! resolves the provider, checks the provider's capabilities and only then
//! hands the request to the adapter, returning its answer unchanged. Every
//! call, including ones rejected up front, is reported to the event sink.

use crate::error::{NailError, NailResult};
use crate::events::{EventSink, NailEvent, TracingSink};
use crate::protocol::{ChatRequest, ChatResponse};
use crate::providers::{Adapter, ProviderRegistry, ResponseStream};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Provider-neutral entry point
#[derive(Clone)]
pub struct NailClient {
    registry: Arc<ProviderRegistry>,
    sink: Arc<dyn EventSink>,
}

impl NailClient {
    /// Create a client reporting events through [`TracingSink`]
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            sink: Arc::new(TracingSink),
        }
    }

    /// Client over the process-wide registry installed with [`crate::providers::init`]
    pub fn from_global() -> Option<Self> {
        crate::providers::global().map(Self::new)
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Validate `request`, then send it to `provider` and wait for the response
    pub async fn invoke(&self, request: &ChatRequest, provider: &str) -> NailResult<ChatResponse> {
        let request_id = Uuid::new_v4();
        let span = tracing::debug_span!("nail.invoke", %request_id, provider);

        let result = async {
            let adapter = self.prepare(request_id, request, provider, false)?;
            let started = Instant::now();
            let response = adapter.send(request).await?;
            self.sink.emit(&NailEvent::response_received(
                request_id,
                provider,
                response.finish_reason,
                response.usage,
                started.elapsed(),
            ));
            Ok(response)
        }
        .instrument(span)
        .await;

        if let Err(e) = &result {
            self.fail(request_id, provider, e);
        }
        result
    }

    /// Validate `request`, then open a stream from `provider`.
    ///
    /// Firing `cancel` at any point ends the stream with [`NailError::Cancelled`].
    /// The stream reports its own terminal event to the sink.
    pub async fn invoke_stream(
        &self,
        request: &ChatRequest,
        provider: &str,
        cancel: CancellationToken,
    ) -> NailResult<ResponseStream> {
        let request_id = Uuid::new_v4();
        let span = tracing::debug_span!("nail.invoke_stream", %request_id, provider);

        let result = async {
            let adapter = self.prepare(request_id, request, provider, true)?;
            let started = Instant::now();
            let stream = adapter.send_stream(request, cancel).await?;
            self.sink.emit(&NailEvent::StreamOpened {
                request_id,
                provider: provider.to_string(),
            });
            Ok(stream.report_to(Arc::clone(&self.sink), request_id, started))
        }
        .instrument(span)
        .await;

        if let Err(e) = &result {
            self.fail(request_id, provider, e);
        }
        result
    }

    /// Structural validation, provider lookup and capability check, in that order
    fn prepare(
        &self,
        request_id: Uuid,
        request: &ChatRequest,
        provider: &str,
        streaming: bool,
    ) -> NailResult<Arc<dyn Adapter>> {
        request.validate()?;
        let adapter = self.registry.resolve(provider)?;
        adapter.capabilities().check(provider, request, streaming)?;

        self.sink.emit(&NailEvent::RequestIssued {
            request_id,
            provider: provider.to_string(),
            model: request.model.clone(),
            streaming,
        });
        Ok(adapter)
    }

    fn fail(&self, request_id: Uuid, provider: &str, error: &NailError) {
        self.sink.emit(&NailEvent::Failed {
            request_id,
            provider: provider.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

impl std::fmt::Debug for NailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NailClient")
            .field("registry", &self.registry)
            .finish()
    }
}
