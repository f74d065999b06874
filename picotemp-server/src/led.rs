//! Status LED drivers.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{Result, ServerError};

/// A binary visual output.
pub trait StatusLed: Send {
    fn set(&mut self, on: bool) -> Result<()>;
}

impl<L: StatusLed + ?Sized> StatusLed for Box<L> {
    fn set(&mut self, on: bool) -> Result<()> {
        (**self).set(on)
    }
}

/// LED exposed through the Linux LED class, e.g.
/// `/sys/class/leds/ACT/brightness`.
#[derive(Debug, Clone)]
pub struct SysfsLed {
    brightness: PathBuf,
}

impl SysfsLed {
    pub fn new(brightness: impl Into<PathBuf>) -> Self {
        Self {
            brightness: brightness.into(),
        }
    }
}

impl StatusLed for SysfsLed {
    fn set(&mut self, on: bool) -> Result<()> {
        let value = if on { "1" } else { "0" };
        std::fs::write(&self.brightness, value)
            .map_err(|e| ServerError::Led(format!("{}: {}", self.brightness.display(), e)))
    }
}

/// LED stand-in for hosts without one; state changes only reach the log.
#[derive(Debug, Default)]
pub struct LogLed {
    on: bool,
}

impl LogLed {
    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl StatusLed for LogLed {
    fn set(&mut self, on: bool) -> Result<()> {
        self.on = on;
        debug!(on, "LED");
        Ok(())
    }
}
