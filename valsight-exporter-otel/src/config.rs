//! Configuration for the OpenTelemetry exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use valsight_common::LoggingConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Load(#[from] valsight_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// OpenTelemetry exporter settings.
    #[serde(default)]
    pub opentelemetry: OtelConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OTLP push configuration.
///
/// Fixed for the lifetime of a [`TelemetryClient`](crate::TelemetryClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtelConfig {
    /// Disable the exporter entirely; `start` becomes a no-op.
    #[serde(default)]
    pub disabled: bool,

    /// Collector address, `host:port` or a full URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Path appended to the endpoint for metrics submission.
    #[serde(default = "default_url_path")]
    pub url_path: String,

    /// Basic auth user. Only used when `token` is also set.
    #[serde(default)]
    pub user: String,

    /// Basic auth token. Only used when `user` is also set.
    #[serde(default)]
    pub token: String,

    /// Scrape and push interval in seconds.
    #[serde(default = "default_push_interval")]
    pub push_interval_secs: u64,

    /// Export timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Service name prefix for the OTEL resource.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_endpoint() -> String {
    "localhost:4318".to_string()
}

fn default_url_path() -> String {
    "/v1/metrics".to_string()
}

fn default_push_interval() -> u64 {
    10
}

fn default_timeout() -> u64 {
    10
}

fn default_service_name() -> String {
    "cosmoshub".to_string()
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            endpoint: default_endpoint(),
            url_path: default_url_path(),
            user: String::new(),
            token: String::new(),
            push_interval_secs: default_push_interval(),
            timeout_secs: default_timeout(),
            service_name: default_service_name(),
        }
    }
}

impl OtelConfig {
    /// Get push interval as Duration.
    pub fn push_interval(&self) -> Duration {
        Duration::from_secs(self.push_interval_secs)
    }

    /// Get timeout as Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether pushes carry a Basic auth header.
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty() && !self.token.is_empty()
    }

    /// Validate the OTLP settings.
    ///
    /// A disabled configuration is always valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.disabled {
            return Ok(());
        }

        if self.endpoint.is_empty() {
            return Err(ConfigError::Validation(
                "OTLP endpoint cannot be empty".to_string(),
            ));
        }

        if self.push_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "push_interval_secs must be > 0".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ExporterConfig = valsight_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = valsight_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.opentelemetry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valsight_common::LogFormat;

    #[test]
    fn test_parse_minimal_config() {
        let config = ExporterConfig::parse("{}").unwrap();

        assert!(!config.opentelemetry.disabled);
        assert_eq!(config.opentelemetry.endpoint, "localhost:4318");
        assert_eq!(config.opentelemetry.url_path, "/v1/metrics");
        assert_eq!(config.opentelemetry.push_interval(), Duration::from_secs(10));
        assert!(!config.opentelemetry.has_credentials());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            opentelemetry: {
                endpoint: "otlp.example.net:443",
                url_path: "/otlp/v1/metrics",
                user: "12345",
                token: "secret",
                push_interval_secs: 30,
                timeout_secs: 5,
                service_name: "gaia",
            },
            logging: {
                level: "debug",
                format: "json"
            }
        }"#;

        let config = ExporterConfig::parse(json).unwrap();

        assert_eq!(config.opentelemetry.endpoint, "otlp.example.net:443");
        assert_eq!(config.opentelemetry.url_path, "/otlp/v1/metrics");
        assert_eq!(config.opentelemetry.push_interval_secs, 30);
        assert_eq!(config.opentelemetry.timeout(), Duration::from_secs(5));
        assert_eq!(config.opentelemetry.service_name, "gaia");
        assert!(config.opentelemetry.has_credentials());
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_credentials_need_both_fields() {
        let config = OtelConfig {
            user: "alice".to_string(),
            ..Default::default()
        };
        assert!(!config.has_credentials());

        let config = OtelConfig {
            token: "t0ken".to_string(),
            ..Default::default()
        };
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_validate_empty_endpoint() {
        let result = ExporterConfig::parse(r#"{ opentelemetry: { endpoint: "" } }"#);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("endpoint"));
    }

    #[test]
    fn test_validate_zero_interval() {
        let result = ExporterConfig::parse(r#"{ opentelemetry: { push_interval_secs: 0 } }"#);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_parse_error_is_load_error() {
        let result = ExporterConfig::parse("{ opentelemetry: ");
        assert!(matches!(
            result,
            Err(ConfigError::Load(valsight_common::Error::Config(_)))
        ));
    }

    #[test]
    fn test_disabled_skips_validation() {
        let json = r#"{
            opentelemetry: { disabled: true, endpoint: "", push_interval_secs: 0 }
        }"#;

        let config = ExporterConfig::parse(json).unwrap();
        assert!(config.opentelemetry.disabled);
    }
}
