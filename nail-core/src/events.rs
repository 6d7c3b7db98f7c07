//! Structured call events
//!
//! The core reports what it does through an injected [`EventSink`] instead of
//! owning a logging pipeline. [`TracingSink`] forwards events to `tracing`,
//! [`MemorySink`] keeps them for inspection in tests.

use crate::error::ErrorKind;
use crate::protocol::{FinishReason, Usage};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// One observable step of a provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NailEvent {
    /// A request passed validation and is about to be dispatched
    RequestIssued {
        request_id: Uuid,
        provider: String,
        model: String,
        streaming: bool,
    },
    /// A complete response came back
    ResponseReceived {
        request_id: Uuid,
        provider: String,
        finish_reason: FinishReason,
        usage: Usage,
        latency_ms: u64,
    },
    /// A stream was opened; fragments follow lazily
    StreamOpened {
        request_id: Uuid,
        provider: String,
    },
    /// The call failed
    Failed {
        request_id: Uuid,
        provider: String,
        kind: ErrorKind,
        message: String,
    },
}

impl NailEvent {
    pub fn request_id(&self) -> Uuid {
        match self {
            NailEvent::RequestIssued { request_id, .. }
            | NailEvent::ResponseReceived { request_id, .. }
            | NailEvent::StreamOpened { request_id, .. }
            | NailEvent::Failed { request_id, .. } => *request_id,
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            NailEvent::RequestIssued { provider, .. }
            | NailEvent::ResponseReceived { provider, .. }
            | NailEvent::StreamOpened { provider, .. }
            | NailEvent::Failed { provider, .. } => provider,
        }
    }

    pub(crate) fn response_received(
        request_id: Uuid,
        provider: &str,
        finish_reason: FinishReason,
        usage: Usage,
        latency: Duration,
    ) -> Self {
        NailEvent::ResponseReceived {
            request_id,
            provider: provider.to_string(),
            finish_reason,
            usage,
            latency_ms: latency.as_millis() as u64,
        }
    }
}

/// Destination for [`NailEvent`]s. Must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &NailEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &NailEvent) {}
}

/// Forwards events to `tracing` under the `nail::events` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &NailEvent) {
        match event {
            NailEvent::RequestIssued {
                request_id,
                provider,
                model,
                streaming,
            } => tracing::info!(
                target: "nail::events",
                %request_id, provider = %provider, model = %model, streaming,
                "request issued"
            ),
            NailEvent::ResponseReceived {
                request_id,
                provider,
                finish_reason,
                usage,
                latency_ms,
            } => tracing::info!(
                target: "nail::events",
                %request_id, provider = %provider, finish_reason = %finish_reason,
                input_tokens = usage.input_tokens, output_tokens = usage.output_tokens,
                latency_ms,
                "response received"
            ),
            NailEvent::StreamOpened {
                request_id,
                provider,
            } => tracing::debug!(
                target: "nail::events",
                %request_id, provider = %provider,
                "stream opened"
            ),
            NailEvent::Failed {
                request_id,
                provider,
                kind,
                message,
            } => tracing::warn!(
                target: "nail::events",
                %request_id, provider = %provider, kind = %kind, error = %message,
                "request failed"
            ),
        }
    }
}

/// Keeps events in memory, bounded to the most recent `max_events`
#[derive(Debug, Clone)]
pub struct MemorySink {
    events: Arc<RwLock<Vec<NailEvent>>>,
    max_events: usize,
}

impl MemorySink {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events,
        }
    }

    pub fn events(&self) -> Vec<NailEvent> {
        match self.events.read() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_for(&self, request_id: Uuid) -> Vec<NailEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.request_id() == request_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &NailEvent) {
        let mut events = match self.events.write() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event.clone());
        if events.len() > self.max_events {
            events.remove(0);
        }
    }
}
