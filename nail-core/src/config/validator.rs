//! Configuration validation utilities

use super::env::ENV_VAR_PATTERN;
use super::error::{ValidationError, ValidationErrorKind};
use super::schema::NailConfig;
use regex::Regex;
use tracing::warn;

/// Configuration validator with rules beyond [`NailConfig::validate`]
pub struct ConfigValidator {
    /// Allowed shape of provider identifiers
    id_pattern: Regex,
    /// Pattern for sensitive field names
    sensitive_pattern: Regex,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self {
            id_pattern: Regex::new(r"^[a-z0-9][a-z0-9_.-]*$").expect("static pattern compiles"),
            sensitive_pattern: Regex::new(r"(?i)(api_key|secret|token|password|credential)")
                .expect("static pattern compiles"),
        }
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &NailConfig) -> Result<(), ValidationError> {
        config.validate()?;

        self.validate_ids(config)?;
        self.validate_enabled(config)?;
        self.validate_api_keys(config)?;

        Ok(())
    }

    fn validate_ids(&self, config: &NailConfig) -> Result<(), ValidationError> {
        for (i, provider) in config.providers.iter().enumerate() {
            if !self.id_pattern.is_match(&provider.id) {
                return Err(ValidationError::invalid_format(
                    format!("providers[{}].id", i),
                    format!(
                        "'{}' must be lower-case letters, digits, '.', '_' or '-'",
                        provider.id
                    ),
                ));
            }
        }
        Ok(())
    }

    fn validate_enabled(&self, config: &NailConfig) -> Result<(), ValidationError> {
        if config.enabled_providers().next().is_none() {
            return Err(ValidationError::new(
                "providers",
                ValidationErrorKind::RequiredFieldMissing,
            )
            .with_context("At least one provider must be enabled"));
        }
        Ok(())
    }

    /// Keys are interpolated before validation, so a leftover placeholder
    /// means the text was never expanded.
    fn validate_api_keys(&self, config: &NailConfig) -> Result<(), ValidationError> {
        for (i, provider) in config.providers.iter().enumerate() {
            if ENV_VAR_PATTERN.is_match(provider.api_key.expose_secret()) {
                return Err(ValidationError::invalid_format(
                    format!("providers[{}].api_key", i),
                    "contains an unexpanded ${VAR} placeholder",
                ));
            }
            if provider.api_key.expose_secret().trim() != provider.api_key.expose_secret() {
                warn!(
                    "API key for provider '{}' has surrounding whitespace",
                    provider.id
                );
            }
        }
        Ok(())
    }

    /// Check if a field name appears to contain sensitive information
    pub fn is_sensitive_field(&self, field_name: &str) -> bool {
        self.sensitive_pattern.is_match(field_name)
    }

    /// Extract environment variables from a string
    pub fn extract_env_vars(&self, text: &str) -> Vec<String> {
        ENV_VAR_PATTERN
            .captures_iter(text)
            .map(|cap| cap[1].to_string())
            .collect()
    }
}
