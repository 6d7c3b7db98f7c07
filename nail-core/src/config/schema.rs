//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::capabilities::Capabilities;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration schema version understood by this crate
pub const SUPPORTED_VERSION: &str = "1";

/// Root configuration: the providers to register and how to reach them
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NailConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// Providers to register, in order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Global connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// One provider registration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Identifier the provider is registered under
    pub id: String,

    /// Wire format spoken by the provider
    #[serde(rename = "type")]
    pub kind: ProviderKind,

    /// API key (supports environment variable interpolation)
    pub api_key: SecretString,

    /// Base URL override; the provider's public endpoint when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request timeout override in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// `max_tokens` sent when a request leaves it unset (anthropic only)
    #[serde(default)]
    pub default_max_tokens: Option<u32>,

    /// Wrap requests in the `input_args` envelope (chutes only)
    #[serde(default)]
    pub wrap_invocation: bool,

    /// Narrow or widen the wire format's default capabilities
    #[serde(default)]
    pub capabilities: Option<Capabilities>,

    /// Whether this provider is registered at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Supported provider wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Chutes,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Chutes => "chutes",
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_idle_per_host: default_max_idle(),
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// Default value functions for serde
fn default_true() -> bool { true }
fn default_connect_timeout() -> u64 { 10000 }
fn default_request_timeout() -> u64 { 60000 }
fn default_max_idle() -> usize { 10 }

impl NailConfig {
    /// Providers that should be registered
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != SUPPORTED_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: SUPPORTED_VERSION.to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        if self.providers.is_empty() {
            return Err(ValidationError::required("providers")
                .with_context("At least one provider must be configured"));
        }

        let mut seen_ids = std::collections::HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if !seen_ids.insert(&provider.id) {
                return Err(ValidationError::new(
                    format!("providers[{}].id", i),
                    ValidationErrorKind::DuplicateValue {
                        value: provider.id.clone(),
                    },
                ));
            }

            provider.validate(&format!("providers[{}]", i))?;
        }

        self.connection.validate("connection")
    }
}

impl ProviderConfig {
    /// Request timeout for this provider, falling back to the global one
    pub fn timeout(&self, connection: &ConnectionConfig) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| connection.request_timeout())
    }

    /// Validate provider configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::required(format!("{}.id", path)));
        }

        if self.api_key.is_empty() {
            return Err(ValidationError::required(format!("{}.api_key", path)));
        }

        if let Some(base_url) = &self.base_url {
            match url::Url::parse(base_url) {
                Ok(url) => {
                    if url.scheme() != "http" && url.scheme() != "https" {
                        return Err(ValidationError::new(
                            format!("{}.base_url", path),
                            ValidationErrorKind::InvalidUrl {
                                message: format!(
                                    "URL scheme must be http or https, got: {}",
                                    url.scheme()
                                ),
                            },
                        ));
                    }
                }
                Err(e) => {
                    return Err(ValidationError::new(
                        format!("{}.base_url", path),
                        ValidationErrorKind::InvalidUrl {
                            message: e.to_string(),
                        },
                    ));
                }
            }
        }

        if self.timeout_ms == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.timeout_ms", path),
                "Must be greater than 0",
            ));
        }

        if let Some(max_tokens) = self.default_max_tokens {
            if self.kind != ProviderKind::Anthropic {
                return Err(ValidationError::incompatible(
                    format!("{}.default_max_tokens", path),
                    format!("only applies to anthropic providers, not {}", self.kind.as_str()),
                ));
            }
            if max_tokens == 0 {
                return Err(ValidationError::out_of_range(
                    format!("{}.default_max_tokens", path),
                    "Must be greater than 0",
                ));
            }
        }

        if self.wrap_invocation && self.kind != ProviderKind::Chutes {
            return Err(ValidationError::incompatible(
                format!("{}.wrap_invocation", path),
                format!("only applies to chutes providers, not {}", self.kind.as_str()),
            ));
        }

        Ok(())
    }
}

impl ConnectionConfig {
    /// Validate connection settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.connect_timeout_ms", path),
                "Must be greater than 0",
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.request_timeout_ms", path),
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}
