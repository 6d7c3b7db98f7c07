//! HTTP transport implementation using reqwest

use super::error::map_http_error;
use super::{ByteStream, Transport, TransportRequest, TransportResponse};
use crate::error::{NailError, NailResult};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, ClientBuilder, Response};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Maximum response size (10MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("nail/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with connection pooling
#[derive(Clone)]
pub struct HttpTransport {
    /// The underlying reqwest client (internally reference counted)
    client: Client,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

impl HttpTransport {
    /// Create a new HTTP transport with default settings
    pub fn new() -> NailResult<Self> {
        Self::with_config(Duration::from_secs(10), 10)
    }

    /// Create a new HTTP transport with custom pool settings.
    ///
    /// Request timeouts are per call and come from [`TransportRequest::timeout`].
    pub fn with_config(connect_timeout: Duration, max_idle_per_host: usize) -> NailResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| NailError::transport(None, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::from_client(client))
    }

    /// Wrap a caller-configured reqwest client
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            max_response_size: MAX_RESPONSE_SIZE,
        }
    }

    pub fn with_max_response_size(mut self, max_response_size: usize) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    fn build(&self, request: &TransportRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(&request.url)
            .header("Content-Type", "application/json")
            .header("X-Request-ID", request.request_id.to_string())
            .body(request.body.clone());

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        builder
    }

    /// Check response size to prevent OOM
    fn check_content_length(&self, response: &Response) -> NailResult<()> {
        if let Some(content_length) = response.content_length() {
            if content_length as usize > self.max_response_size {
                return Err(NailError::transport(
                    Some(response.status().as_u16()),
                    format!(
                        "Response size {} exceeds maximum {}",
                        content_length, self.max_response_size
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Turn a non-success response into an error, reading its body for details
    async fn fail(response: Response, request: &TransportRequest) -> NailError {
        let status = response.status().as_u16();
        let body = response.text().await.ok();
        warn!(
            "Request failed with status {} [request_id: {}]",
            status, request.request_id
        );
        map_http_error(status, body, request.request_id)
    }
}

fn map_reqwest_error(e: reqwest::Error, request: &TransportRequest) -> NailError {
    let request_id = request.request_id;
    if e.is_timeout() {
        warn!("Request timeout [request_id: {}]", request_id);
        NailError::Timeout(format!(
            "no response within {:?} [request_id: {}]",
            request.timeout, request_id
        ))
    } else if e.is_connect() {
        error!("Connection error [request_id: {}]: {}", request_id, e);
        NailError::transport(
            None,
            format!("Connection failed: {} [request_id: {}]", e, request_id),
        )
    } else {
        error!("Request error [request_id: {}]: {}", request_id, e);
        NailError::transport(
            e.status().map(|s| s.as_u16()),
            format!("{} [request_id: {}]", e, request_id),
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> NailResult<TransportResponse> {
        debug!("POST {} [request_id: {}]", request.url, request.request_id);

        let response = self
            .build(&request)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, &request))?;

        let status = response.status();
        debug!("Response status: {} [request_id: {}]", status, request.request_id);

        if !status.is_success() {
            return Err(Self::fail(response, &request).await);
        }

        self.check_content_length(&response)?;

        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, &request))?;

        if body.len() > self.max_response_size {
            return Err(NailError::transport(
                Some(status.as_u16()),
                format!(
                    "Response size {} exceeds maximum {} [request_id: {}]",
                    body.len(),
                    self.max_response_size,
                    request.request_id
                ),
            ));
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_streaming(&self, request: TransportRequest) -> NailResult<ByteStream> {
        debug!(
            "POST {} (streaming) [request_id: {}]",
            request.url, request.request_id
        );

        // Timeout covers the wait for response headers only.
        let response = tokio::time::timeout(request.timeout, self.build(&request).send())
            .await
            .map_err(|_| {
                warn!("Stream open timeout [request_id: {}]", request.request_id);
                NailError::Timeout(format!(
                    "no response headers within {:?} [request_id: {}]",
                    request.timeout, request.request_id
                ))
            })?
            .map_err(|e| map_reqwest_error(e, &request))?;

        if !response.status().is_success() {
            return Err(Self::fail(response, &request).await);
        }

        let request_id = request.request_id;
        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| {
                NailError::transport(
                    None,
                    format!("Stream read failed: {} [request_id: {}]", e, request_id),
                )
            })
        });

        Ok(Box::pin(stream))
    }
}
