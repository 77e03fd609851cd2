//! Client configuration types

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::models::{DEFAULT_THRESHOLD, validate_threshold};

/// Environment variable holding the clustering service base URL
pub const ENV_API_URL: &str = "TRADE_DEDUPE_API_URL";
/// Environment variable holding an optional bearer token
pub const ENV_API_TOKEN: &str = "TRADE_DEDUPE_API_TOKEN";
/// Environment variable holding the request timeout in seconds
pub const ENV_TIMEOUT: &str = "TRADE_DEDUPE_TIMEOUT";

/// Configuration for talking to the clustering service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the service (e.g., "http://localhost:5000")
    pub base_url: String,
    /// Optional bearer token for authentication
    pub auth_token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Threshold each stage starts with
    pub default_threshold: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            auth_token: None,
            timeout_seconds: 120,
            default_threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ClientConfig {
    /// Create a new client config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the bearer token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the default threshold
    pub fn with_default_threshold(mut self, threshold: f64) -> Self {
        self.default_threshold = threshold;
        self
    }

    /// Base URL without a trailing slash
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Validate the configuration
    pub fn validate(&self) -> PipelineResult<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(PipelineError::ConfigError(
                "Base URL cannot be empty".to_string(),
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(PipelineError::ConfigError(format!(
                "Base URL must start with http:// or https://: {}",
                url
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(PipelineError::ConfigError(
                "Timeout must be at least one second".to_string(),
            ));
        }
        validate_threshold(self.default_threshold).map_err(|_| {
            PipelineError::ConfigError(format!(
                "Default threshold {} must be between 0 and 1",
                self.default_threshold
            ))
        })?;
        Ok(())
    }

    /// Build a config from defaults overridden by environment variables
    pub fn from_env() -> PipelineResult<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(ENV_API_URL) {
            config.base_url = url;
        }
        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            if !token.is_empty() {
                config.auth_token = Some(token);
            }
        }
        if let Ok(timeout) = std::env::var(ENV_TIMEOUT) {
            config.timeout_seconds = timeout.parse().map_err(|_| {
                PipelineError::ConfigError(format!("{} must be an integer: {}", ENV_TIMEOUT, timeout))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a config from TOML text; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> PipelineResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PipelineError::ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn from_toml_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.timeout_seconds, 120);
        assert_eq!(config.default_threshold, 0.8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_base_url("https://dedupe.example.com/")
            .with_auth_token("secret")
            .with_timeout(30)
            .with_default_threshold(0.75);

        assert_eq!(config.normalized_base_url(), "https://dedupe.example.com");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.default_threshold, 0.75);
    }

    #[test]
    fn test_config_validation() {
        assert!(ClientConfig::new().with_base_url("").validate().is_err());
        assert!(
            ClientConfig::new()
                .with_base_url("localhost:5000")
                .validate()
                .is_err()
        );
        assert!(ClientConfig::new().with_timeout(0).validate().is_err());
        assert!(
            ClientConfig::new()
                .with_default_threshold(1.5)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_from_toml_str() {
        let config = ClientConfig::from_toml_str(
            r#"
            base_url = "http://10.0.0.4:5000"
            timeout_seconds = 45
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url, "http://10.0.0.4:5000");
        assert_eq!(config.timeout_seconds, 45);
        assert_eq!(config.default_threshold, 0.8);

        assert!(matches!(
            ClientConfig::from_toml_str("timeout_seconds = \"soon\""),
            Err(PipelineError::ConfigError(_))
        ));
    }
}
