//! Configuration for the Prometheus exporter.

use std::path::Path;

use picotemp_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Sensor connection settings.
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Seconds to wait before serving, giving the sensor time to join the
    /// network after a shared power-up.
    #[serde(default)]
    pub startup_delay_secs: u64,
}

/// Sensor connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorConfig {
    /// URL of the sensor's reading endpoint, e.g. `http://picotemp.lan/`.
    #[serde(default)]
    pub url: Option<String>,
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:3030").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Metric name prefix (default: "pico").
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_listen() -> String {
    "0.0.0.0:3030".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_prefix() -> String {
    "pico".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            prefix: default_prefix(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// A missing sensor URL is accepted here because it may still arrive from
    /// the command line or environment; see [`ExporterConfig::sensor_url`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.sensor.url {
            let parsed = reqwest::Url::parse(url).map_err(|e| {
                ConfigError::Validation(format!("Invalid sensor url '{}': {}", url, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Validation(format!(
                    "Sensor url must use http or https: {}",
                    url
                )));
            }
        }

        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        if !self.prometheus.path.starts_with('/') || self.prometheus.path == "/" {
            return Err(ConfigError::Validation(
                "Metrics path must start with / and not be the root page".to_string(),
            ));
        }

        if !is_valid_metric_prefix(&self.prometheus.prefix) {
            return Err(ConfigError::Validation(format!(
                "Invalid metric prefix: {}",
                self.prometheus.prefix
            )));
        }

        Ok(())
    }

    /// The configured sensor URL.
    pub fn sensor_url(&self) -> Result<&str, ConfigError> {
        self.sensor.url.as_deref().ok_or_else(|| {
            ConfigError::Validation(
                "Sensor url not set (use sensor.url, --sensor-url or PICO_SERVER_URL)".to_string(),
            )
        })
    }
}

/// Prometheus metric names match `[a-zA-Z_][a-zA-Z0-9_]*` (colons are
/// reserved for recording rules).
fn is_valid_metric_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
