//! Sensor server configuration.

use std::net::SocketAddr;
use std::path::Path;

use picotemp_common::{LoggingConfig, Reading};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};
use crate::led::{LogLed, StatusLed, SysfsLed};
use crate::thermometer::{DEFAULT_THERMAL_ZONE, FixedThermometer, SysfsThermometer, Thermometer};

/// Complete sensor server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ListenConfig,

    /// Where the temperature comes from.
    #[serde(default)]
    pub thermometer: ThermometerConfig,

    /// Which LED signals requests.
    #[serde(default)]
    pub led: LedConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Address to listen on (default: "0.0.0.0:80").
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "0.0.0.0:80".to_string()
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Temperature source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ThermometerConfig {
    /// File holding millidegrees Celsius.
    Sysfs {
        #[serde(default = "default_thermal_zone")]
        path: String,
    },
    /// Constant reading, for demos and testing.
    Fixed { celsius: f64 },
}

fn default_thermal_zone() -> String {
    DEFAULT_THERMAL_ZONE.to_string()
}

impl Default for ThermometerConfig {
    fn default() -> Self {
        ThermometerConfig::Sysfs {
            path: default_thermal_zone(),
        }
    }
}

impl ThermometerConfig {
    pub fn open(&self) -> Box<dyn Thermometer> {
        match self {
            ThermometerConfig::Sysfs { path } => Box::new(SysfsThermometer::new(path)),
            ThermometerConfig::Fixed { celsius } => {
                Box::new(FixedThermometer(Reading::from_celsius(*celsius)))
            }
        }
    }
}

/// Status LED sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LedConfig {
    /// No LED; state changes are logged at debug level.
    #[default]
    Log,
    /// Linux LED class brightness file.
    Sysfs { path: String },
}

impl LedConfig {
    pub fn open(&self) -> Box<dyn StatusLed> {
        match self {
            LedConfig::Log => Box::new(LogLed::default()),
            LedConfig::Sysfs { path } => Box::new(SysfsLed::new(path)),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: ServerConfig = picotemp_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: ServerConfig = picotemp_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;

        if let ThermometerConfig::Fixed { celsius } = self.thermometer {
            if !celsius.is_finite() {
                return Err(validation("Fixed thermometer value must be finite"));
            }
        }

        Ok(())
    }

    /// The parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server
            .listen
            .parse()
            .map_err(|_| validation(&format!("Invalid listen address: {}", self.server.listen)))
    }
}

fn validation(message: &str) -> ServerError {
    ServerError::Config(picotemp_common::Error::Config(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use picotemp_common::LogFormat;

    #[test]
    fn test_parse_minimal_config() {
        let config = ServerConfig::parse("{}").unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:80");
        assert_eq!(
            config.thermometer,
            ThermometerConfig::Sysfs {
                path: DEFAULT_THERMAL_ZONE.to_string()
            }
        );
        assert_eq!(config.led, LedConfig::Log);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            server: { listen: "0.0.0.0:8080" },
            thermometer: { kind: "fixed", celsius: 21.5 },
            led: { kind: "sysfs", path: "/sys/class/leds/ACT/brightness" },
            logging: { level: "debug", format: "json" },
        }"#;

        let config = ServerConfig::parse(json).unwrap();

        assert_eq!(config.listen_addr().unwrap().port(), 8080);
        assert_eq!(config.thermometer, ThermometerConfig::Fixed { celsius: 21.5 });
        assert_eq!(
            config.led,
            LedConfig::Sysfs {
                path: "/sys/class/leds/ACT/brightness".to_string()
            }
        );
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_sysfs_thermometer_default_path() {
        let config = ServerConfig::parse(r#"{ thermometer: { kind: "sysfs" } }"#).unwrap();
        assert_eq!(config.thermometer, ThermometerConfig::default());
    }

    #[test]
    fn test_open_fixed_thermometer() {
        let config = ThermometerConfig::Fixed { celsius: 23.456 };
        let reading = config.open().read().unwrap();
        assert_eq!(reading.fahrenheit(), 74.2208);
    }

    #[test]
    fn test_validate_invalid_listen() {
        let result = ServerConfig::parse(r#"{ server: { listen: "port eighty" } }"#);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid listen address")
        );
    }

    #[test]
    fn test_unknown_thermometer_kind() {
        let result = ServerConfig::parse(r#"{ thermometer: { kind: "onewire" } }"#);
        assert!(result.is_err());
    }
}
