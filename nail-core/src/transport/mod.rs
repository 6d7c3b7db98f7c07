//! Transport abstraction used by adapters
//!
//! Adapters only need "send bytes, get bytes (or a stream of bytes) back".
//! The [`Transport`] trait captures exactly that so the HTTP stack can be
//! swapped for a stub in tests, or for a caller-owned client with its own
//! pooling and rate limiting. [`HttpTransport`] is the reqwest-backed
//! default.
//!
//! Transports report failures as [`crate::NailError::Transport`] (carrying the HTTP
//! status when there is one) or [`crate::NailError::Timeout`]. They never retry.

pub mod error;
pub mod http;

use crate::error::NailResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

pub use http::HttpTransport;

/// Lazily produced response body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = NailResult<Bytes>> + Send>>;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// An outgoing provider call, already encoded
#[derive(Clone)]
pub struct TransportRequest {
    /// Full URL to POST to
    pub url: String,

    /// Headers to send, credentials included
    pub headers: Vec<(String, String)>,

    /// Encoded JSON body
    pub body: Bytes,

    /// Give up after this long
    pub timeout: Duration,

    /// Correlation ID, forwarded as `X-Request-ID`
    pub request_id: Uuid,
}

impl TransportRequest {
    pub fn new(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: body.into(),
            timeout: DEFAULT_TIMEOUT,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    /// Look up a header value, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Headers carry credentials, so they are never printed.
impl std::fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRequest")
            .field("url", &self.url)
            .field("headers", &format_args!("[{} redacted]", self.headers.len()))
            .field("body_len", &self.body.len())
            .field("timeout", &self.timeout)
            .field("request_id", &self.request_id)
            .finish()
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Byte-level channel to a provider
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and read the whole body
    async fn send(&self, request: TransportRequest) -> NailResult<TransportResponse>;

    /// Send a request and hand back the body as it arrives.
    ///
    /// Dropping the returned stream must release the underlying connection.
    async fn send_streaming(&self, request: TransportRequest) -> NailResult<ByteStream>;
}
