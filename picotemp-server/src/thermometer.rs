//! Temperature sensor drivers.

use std::path::PathBuf;

use picotemp_common::Reading;

use crate::error::{Result, ServerError};

/// Default Linux thermal zone exposing the SoC temperature.
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// A local, synchronous temperature source.
pub trait Thermometer: Send {
    fn read(&mut self) -> Result<Reading>;
}

impl<T: Thermometer + ?Sized> Thermometer for Box<T> {
    fn read(&mut self) -> Result<Reading> {
        (**self).read()
    }
}

/// Reads a sysfs file holding the temperature in millidegrees Celsius.
#[derive(Debug, Clone)]
pub struct SysfsThermometer {
    path: PathBuf,
}

impl SysfsThermometer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Thermometer for SysfsThermometer {
    fn read(&mut self) -> Result<Reading> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            ServerError::Thermometer(format!("{}: {}", self.path.display(), e))
        })?;

        let millidegrees: i32 = raw.trim().parse().map_err(|e| {
            ServerError::Thermometer(format!(
                "{}: invalid value {:?}: {}",
                self.path.display(),
                raw.trim(),
                e
            ))
        })?;

        Ok(Reading::from_millidegrees(millidegrees))
    }
}

/// Always reports the same temperature.
#[derive(Debug, Clone, Copy)]
pub struct FixedThermometer(pub Reading);

impl Thermometer for FixedThermometer {
    fn read(&mut self) -> Result<Reading> {
        Ok(self.0)
    }
}
