use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single temperature measurement.
///
/// Celsius is the source of truth; Fahrenheit is always derived from it.
/// Serializes as `{"tempC":<f64>,"tempF":<f64>}` in that field order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireReading")]
pub struct Reading {
    #[serde(rename = "tempC")]
    celsius: f64,

    #[serde(rename = "tempF")]
    fahrenheit: f64,
}

impl Reading {
    /// Create a reading from a Celsius value.
    pub fn from_celsius(celsius: f64) -> Self {
        Self {
            celsius,
            fahrenheit: celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Create a reading from thousandths of a degree Celsius, the unit used
    /// by on-chip sensors and Linux thermal zones.
    pub fn from_millidegrees(millidegrees: i32) -> Self {
        Self::from_celsius(f64::from(millidegrees) / 1000.0)
    }

    /// The all-zero reading reported while the sensor is unreachable.
    pub const fn zero() -> Self {
        Self {
            celsius: 0.0,
            fahrenheit: 0.0,
        }
    }

    pub fn celsius(&self) -> f64 {
        self.celsius
    }

    pub fn fahrenheit(&self) -> f64 {
        self.fahrenheit
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::zero()
    }
}

/// Payload as it arrives from the sensor. Both fields are required, but
/// `tempF` is discarded and recomputed from `tempC`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireReading {
    #[serde(rename = "tempC")]
    temp_c: f64,

    #[serde(rename = "tempF")]
    temp_f: f64,
}

impl From<WireReading> for Reading {
    fn from(wire: WireReading) -> Self {
        let reading = Reading::from_celsius(wire.temp_c);
        if (wire.temp_f - reading.fahrenheit).abs() > FAHRENHEIT_TOLERANCE {
            debug!(
                received = wire.temp_f,
                computed = reading.fahrenheit,
                "Ignoring inconsistent tempF"
            );
        }
        reading
    }
}

/// Rounding slack allowed between a received and a recomputed `tempF`.
const FAHRENHEIT_TOLERANCE: f64 = 1e-6;
