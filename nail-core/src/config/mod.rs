//! Provider configuration
//!
//! Callers hand over configuration text (YAML or JSON) they obtained however
//! they like; this module never touches the filesystem. `${VAR}` placeholders
//! are expanded from the environment before parsing, then the result is
//! validated with field paths in every error.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::{interpolate_env_vars, interpolate_with};
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{ConnectionConfig, NailConfig, ProviderConfig, ProviderKind, SUPPORTED_VERSION};
pub use secrets::SecretString;
pub use validator::ConfigValidator;

impl NailConfig {
    /// Parse and validate YAML configuration text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let interpolated = env::interpolate_env_vars(content)?;

        let config: NailConfig =
            serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
                format: "yaml",
                line: e.location().map(|l| l.line()),
                column: e.location().map(|l| l.column()),
                message: e.to_string(),
            })?;

        ConfigValidator::new().validate(&config)?;
        Ok(config)
    }

    /// Parse and validate JSON configuration text
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let interpolated = env::interpolate_env_vars(content)?;

        let config: NailConfig =
            serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
                format: "json",
                line: Some(e.line()),
                column: Some(e.column()),
                message: e.to_string(),
            })?;

        ConfigValidator::new().validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_yaml() {
        let yaml = r#"
version: "1"
providers:
  - id: openai
    type: openai
    api_key: sk-test
  - id: claude
    type: anthropic
    api_key: sk-ant-test
    default_max_tokens: 2048
  - id: chutes
    type: chutes
    api_key: cpk-test
    base_url: https://my-chute.chutes.ai
    wrap_invocation: true
    enabled: false
"#;
        let config = NailConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.providers[1].kind, ProviderKind::Anthropic);
        assert_eq!(config.enabled_providers().count(), 2);
    }

    #[test]
    fn test_parse_error_reports_location() {
        let err = NailConfig::from_json_str("{\"version\": \"1\",\n \"providers\": [").unwrap_err();
        match err {
            ConfigError::ParseError { format, line, .. } => {
                assert_eq!(format, "json");
                assert_eq!(line, Some(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
