//! Sensor drivers on the board I2C bus
//!
//! - **`pmsa003i`**: particulate matter, the sensor every cycle depends on
//! - **`spa06`**: optional temperature/pressure
//!
//! Drivers do no retrying of their own. The poll loop skips a cycle on
//! [`SensorError`] and tries again on the next one.

use core::future::Future;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::reading::{Ambient, ParticulateSample};

pub mod pmsa003i;
pub mod spa06;

pub use pmsa003i::Pmsa003i;
pub use spa06::Spa06;

/// Sensor read errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum SensorError {
    /// I2C transaction failed (NACK, arbitration loss, ...)
    Bus,
    /// The bus read did not finish in time
    Timeout,
    /// Frame does not start with the `BM` start bytes
    BadHeader,
    /// Frame length field is wrong
    BadLength,
    /// Frame checksum mismatch
    BadChecksum,
    /// Sensor has no fresh measurement or is not initialized
    NotReady,
    /// Device at the address reported an unexpected id
    UnknownDevice(u8),
}

impl core::fmt::Display for SensorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus => write!(f, "sensor bus error"),
            Self::Timeout => write!(f, "sensor read timed out"),
            Self::BadHeader => write!(f, "bad frame header"),
            Self::BadLength => write!(f, "bad frame length"),
            Self::BadChecksum => write!(f, "frame checksum mismatch"),
            Self::NotReady => write!(f, "sensor not ready"),
            Self::UnknownDevice(id) => write!(f, "unknown device id {:#04x}", id),
        }
    }
}

impl core::error::Error for SensorError {}

/// Source of particulate samples
pub trait ParticulateSensor {
    /// Read and validate one frame. A malformed frame is an error, never a
    /// partial sample.
    fn poll(&mut self) -> impl Future<Output = Result<ParticulateSample, SensorError>>;
}

/// Source of temperature/pressure measurements
pub trait EnvironmentSensor {
    fn measure(&mut self) -> impl Future<Output = Result<Ambient, SensorError>>;
}
