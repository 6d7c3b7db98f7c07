//! Streaming responses
//!
//! A [`ResponseStream`] yields [`StreamFragment`]s as the provider produces
//! them. It is lazy (nothing is read until polled), finite, and can be
//! consumed once. Cancelling it, through its [`CancellationToken`] or
//! [`ResponseStream::cancel`], drops the underlying byte stream (releasing
//! the connection) and yields a single [`NailError::Cancelled`].
//!
//! A stream attached to an [`EventSink`] reports how it ended: `Failed` on
//! the first error (cancellation included) or when dropped unfinished, and
//! `ResponseReceived` once it ends after a finish reason.

use crate::error::{ErrorKind, NailError, NailResult};
use crate::events::{EventSink, NailEvent};
use crate::protocol::{
    ChatResponse, Choice, FinishReason, Message, MessageContent, Role, StreamFragment, ToolCall,
    Usage,
};
use crate::translators::Translator;
use crate::transport::ByteStream;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{self, BoxStream};
use futures::{ready, Stream, StreamExt};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Fragments not yet guarded by cancellation
pub type FragmentStream = BoxStream<'static, NailResult<StreamFragment>>;

/// Decode a server-sent event body into fragments with `translator`
pub fn decode_sse(bytes: ByteStream, translator: Arc<dyn Translator>) -> FragmentStream {
    bytes
        .eventsource()
        .flat_map(move |event| {
            let decoded: Vec<NailResult<StreamFragment>> = match event {
                Ok(event) => match translator.decode_stream_event(&event.event, &event.data) {
                    Ok(fragments) => fragments.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                },
                Err(EventStreamError::Transport(e)) => vec![Err(e)],
                Err(e) => vec![Err(NailError::decoding(
                    translator.name(),
                    format!("malformed event stream: {}", e),
                ))],
            };
            stream::iter(decoded)
        })
        .boxed()
}

/// Terminal outcome tracking for one streamed call
struct StreamReport {
    request_id: Uuid,
    sink: Arc<dyn EventSink>,
    started: Instant,
    finish_reason: Option<FinishReason>,
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
    reported: bool,
}

impl StreamReport {
    fn observe(&mut self, provider: &str, item: Option<&NailResult<StreamFragment>>) {
        if self.reported {
            return;
        }
        match item {
            Some(Ok(StreamFragment::Finish { reason })) => self.finish_reason = Some(*reason),
            Some(Ok(StreamFragment::Usage {
                input_tokens,
                output_tokens,
            })) => {
                if input_tokens.is_some() {
                    self.input_tokens = *input_tokens;
                }
                if output_tokens.is_some() {
                    self.output_tokens = *output_tokens;
                }
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => self.failed(provider, e.kind(), e.to_string()),
            None => match self.finish_reason {
                Some(finish_reason) => {
                    self.reported = true;
                    let usage = Usage::new(
                        self.input_tokens.unwrap_or(0),
                        self.output_tokens.unwrap_or(0),
                    );
                    self.sink.emit(&NailEvent::response_received(
                        self.request_id,
                        provider,
                        finish_reason,
                        usage,
                        self.started.elapsed(),
                    ));
                }
                None => self.failed(
                    provider,
                    ErrorKind::Decoding,
                    "stream ended without a finish reason".to_string(),
                ),
            },
        }
    }

    fn failed(&mut self, provider: &str, kind: ErrorKind, message: String) {
        self.reported = true;
        self.sink.emit(&NailEvent::Failed {
            request_id: self.request_id,
            provider: provider.to_string(),
            kind,
            message,
        });
    }
}

/// A lazily consumed, cancellable stream of response fragments
pub struct ResponseStream {
    provider: String,
    model: String,
    cancel: CancellationToken,
    inner: stream::Fuse<FragmentStream>,
    report: Option<StreamReport>,
}

impl ResponseStream {
    /// Guard `fragments` with `cancel`.
    ///
    /// `model` is reported by [`ResponseStream::collect_response`] when the
    /// provider never names one. The stream ends after the first error.
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        fragments: FragmentStream,
        cancel: CancellationToken,
    ) -> Self {
        let inner = stream::unfold(Some((fragments, cancel.clone())), |state| async move {
            let (mut fragments, cancel) = state?;
            if cancel.is_cancelled() {
                return Some((Err(NailError::Cancelled), None));
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Stream cancelled, releasing connection");
                    return Some((Err(NailError::Cancelled), None));
                }
                next = fragments.next() => next,
            };

            match next {
                Some(Ok(fragment)) => Some((Ok(fragment), Some((fragments, cancel)))),
                Some(Err(e)) => Some((Err(e), None)),
                None => None,
            }
        })
        .boxed()
        .fuse();

        Self {
            provider: provider.into(),
            model: model.into(),
            cancel,
            inner,
            report: None,
        }
    }

    /// Report the outcome of this stream to `sink` under `request_id`.
    ///
    /// Latency in `ResponseReceived` is measured from `started`.
    pub fn report_to(mut self, sink: Arc<dyn EventSink>, request_id: Uuid, started: Instant) -> Self {
        self.report = Some(StreamReport {
            request_id,
            sink,
            started,
            finish_reason: None,
            input_tokens: None,
            output_tokens: None,
            reported: false,
        });
        self
    }

    /// Build a stream from already decoded fragments
    pub fn from_fragments(
        provider: impl Into<String>,
        model: impl Into<String>,
        fragments: Vec<NailResult<StreamFragment>>,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(provider, model, stream::iter(fragments).boxed(), cancel)
    }

    /// Identifier of the provider producing this stream
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Token that cancels this stream
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel now, releasing the connection before the next poll
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.inner = stream::once(async { Err(NailError::Cancelled) }).boxed().fuse();
    }

    /// Drain the stream and assemble the aggregate response
    pub async fn collect_response(mut self) -> NailResult<ChatResponse> {
        let mut accumulator = StreamAccumulator::new().with_model(self.model.clone());
        while let Some(fragment) = self.next().await {
            accumulator.push(fragment?);
        }
        accumulator.finish(&self.provider)
    }
}

impl Stream for ResponseStream {
    type Item = NailResult<StreamFragment>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let next = ready!(this.inner.poll_next_unpin(cx));
        if let Some(report) = this.report.as_mut() {
            report.observe(&this.provider, next.as_ref());
        }
        Poll::Ready(next)
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if let Some(report) = self.report.as_mut() {
            if !report.reported {
                report.failed(
                    &self.provider,
                    ErrorKind::Cancelled,
                    "stream dropped before completion".to_string(),
                );
            }
        }
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Folds fragments into a [`ChatResponse`].
///
/// Usage counters that never arrive are reported as zero; a stream that
/// never reports a finish reason is a decoding error.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    id: Option<String>,
    model: Option<String>,
    text: String,
    tool_calls: BTreeMap<u32, PartialToolCall>,
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
    finish_reason: Option<FinishReason>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model reported when the stream names none
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Text received so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn push(&mut self, fragment: StreamFragment) {
        match fragment {
            StreamFragment::Start { id, model } => {
                if id.is_some() {
                    self.id = id;
                }
                if model.is_some() {
                    self.model = model;
                }
            }
            StreamFragment::TextDelta { text } => self.text.push_str(&text),
            StreamFragment::ToolCallDelta {
                call_index,
                id,
                name,
                arguments,
            } => {
                let call = self.tool_calls.entry(call_index).or_default();
                if id.is_some() {
                    call.id = id;
                }
                if name.is_some() {
                    call.name = name;
                }
                call.arguments.push_str(&arguments);
            }
            StreamFragment::Usage {
                input_tokens,
                output_tokens,
            } => {
                if input_tokens.is_some() {
                    self.input_tokens = input_tokens;
                }
                if output_tokens.is_some() {
                    self.output_tokens = output_tokens;
                }
            }
            StreamFragment::Finish { reason } => self.finish_reason = Some(reason),
        }
    }

    /// Assemble the response
    pub fn finish(self, provider: &str) -> NailResult<ChatResponse> {
        let finish_reason = self.finish_reason.ok_or_else(|| {
            NailError::decoding(provider, "stream ended without a finish reason")
        })?;

        let tool_calls = self
            .tool_calls
            .into_iter()
            .map(|(index, call)| match (call.id, call.name) {
                (Some(id), Some(name)) => Ok(ToolCall {
                    id,
                    name,
                    arguments: call.arguments,
                }),
                _ => Err(NailError::decoding(
                    provider,
                    format!("tool call {} is missing its id or name", index),
                )),
            })
            .collect::<NailResult<Vec<_>>>()?;

        let message = Message {
            role: Role::Assistant,
            content: MessageContent::Text(self.text),
            name: None,
            tool_calls,
            tool_call_id: None,
        };

        Ok(ChatResponse {
            id: self.id.unwrap_or_default(),
            provider: provider.to_string(),
            model: self.model.unwrap_or_default(),
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason,
            }],
            finish_reason,
            usage: Usage::new(
                self.input_tokens.unwrap_or(0),
                self.output_tokens.unwrap_or(0),
            ),
        })
    }
}
