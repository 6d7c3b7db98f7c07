//! Shared test doubles

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use nail_core::transport::{ByteStream, Transport, TransportRequest, TransportResponse};
use nail_core::NailResult;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

pub const OPENAI_STOP: &str = r#"{
    "id": "chatcmpl-123",
    "object": "chat.completion",
    "model": "gpt-4o-mini",
    "choices": [{
        "index": 0,
        "message": {"role": "assistant", "content": "Hello there!"},
        "finish_reason": "stop"
    }],
    "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
}"#;

/// Transport that answers every call with canned bytes and records what it saw
#[derive(Default)]
pub struct StubTransport {
    body: Bytes,
    chunks: Vec<Bytes>,
    hang_after_chunks: bool,
    calls: AtomicUsize,
    open_streams: Arc<AtomicUsize>,
    last_request: Mutex<Option<TransportRequest>>,
}

impl StubTransport {
    pub fn replying(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Stream `chunks`, then end
    pub fn streaming<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Stream `chunks`, then never produce another byte
    pub fn hanging_after<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            hang_after_chunks: true,
            ..Self::streaming(chunks)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Byte streams handed out and not yet dropped
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<TransportRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn record(&self, request: TransportRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: TransportRequest) -> NailResult<TransportResponse> {
        self.record(request);
        Ok(TransportResponse {
            status: 200,
            body: self.body.clone(),
        })
    }

    async fn send_streaming(&self, request: TransportRequest) -> NailResult<ByteStream> {
        self.record(request);
        let chunks = stream::iter(self.chunks.clone().into_iter().map(Ok));
        let inner: ByteStream = if self.hang_after_chunks {
            chunks.chain(stream::pending()).boxed()
        } else {
            chunks.boxed()
        };
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(Tracked {
            inner,
            open: Arc::clone(&self.open_streams),
        }))
    }
}

/// Byte stream that counts itself out when dropped
struct Tracked {
    inner: ByteStream,
    open: Arc<AtomicUsize>,
}

impl Stream for Tracked {
    type Item = NailResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Format one server-sent event
pub fn sse(data: &str) -> String {
    format!("data: {}\n\n", data)
}

/// Format one named server-sent event
pub fn sse_named(event: &str, data: &str) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}
