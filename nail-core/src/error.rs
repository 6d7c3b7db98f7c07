//! Error taxonomy shared by every layer of the crate

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for NAIL operations
pub type NailResult<T> = Result<T, NailError>;

/// Errors that can occur while invoking a provider through NAIL
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NailError {
    /// The common-API request is structurally malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The request uses a feature the target provider does not support
    #[error("Provider '{provider}' does not support {feature}")]
    UnsupportedFeature { provider: String, feature: String },

    /// No adapter is registered under this identifier
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// An adapter is already registered under this identifier
    #[error("Provider already registered: {0}")]
    DuplicateProvider(String),

    /// The translator could not express a request field in the native payload
    #[error("Failed to encode request for '{provider}' at '{field}': {message}")]
    Encoding {
        provider: String,
        field: String,
        message: String,
    },

    /// The provider's payload could not be mapped back to the common shape
    #[error("Failed to decode response from '{provider}': {message}")]
    Decoding { provider: String, message: String },

    /// Network or HTTP-level failure
    #[error("Transport error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The transport gave up waiting
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// A streaming call was cancelled before it completed
    #[error("Request was cancelled")]
    Cancelled,
}

/// Copyable discriminant of [`NailError`], used in events and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    UnsupportedFeature,
    UnknownProvider,
    DuplicateProvider,
    Encoding,
    Decoding,
    Transport,
    Timeout,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::UnsupportedFeature => "unsupported_feature",
            Self::UnknownProvider => "unknown_provider",
            Self::DuplicateProvider => "duplicate_provider",
            Self::Encoding => "encoding",
            Self::Decoding => "decoding",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NailError {
    /// Shorthand for an [`NailError::UnsupportedFeature`]
    pub fn unsupported(provider: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            provider: provider.into(),
            feature: feature.into(),
        }
    }

    /// Shorthand for an [`NailError::Encoding`]
    pub fn encoding(
        provider: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Encoding {
            provider: provider.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an [`NailError::Decoding`]
    pub fn decoding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decoding {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an [`NailError::Transport`]
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::UnsupportedFeature { .. } => ErrorKind::UnsupportedFeature,
            Self::UnknownProvider(_) => ErrorKind::UnknownProvider,
            Self::DuplicateProvider(_) => ErrorKind::DuplicateProvider,
            Self::Encoding { .. } => ErrorKind::Encoding,
            Self::Decoding { .. } => ErrorKind::Decoding,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// HTTP status attached to a transport error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether an external retry layer may reasonably try again.
    ///
    /// NAIL itself never retries; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Transport { status: None, .. } => true,
            Self::Transport {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
