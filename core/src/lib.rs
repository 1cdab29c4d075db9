//! Platform-agnostic core logic for the air-quality telemetry node
//!
//! This crate contains everything that does not touch a register: settings
//! parsing, sensor frame decoding, SNTP, the Logflare relay, the status
//! screen model and the poll/forward loop. Boards plug in through the
//! traits in `hal-abstractions` and the sensor/telemetry/display traits
//! defined here.
//!
//! Boot order is [`settings::load`], then [`app::Station::boot`] (link,
//! one [`time::sync`], startup event), then [`app::Station::run`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod app;
pub mod display;
pub mod reading;
pub mod relay;
pub mod sensor;
pub mod settings;
pub mod time;
pub mod timeout;

pub use app::{startup_failure, Cycle, Devices, LinkConfig, Station};
pub use display::{render, Color, Fault, Screen, Status, StatusDisplay};
pub use reading::{AirQuality, Ambient, ParticulateSample, Reading};
pub use relay::{Ack, LogflareRelay, RelayConfig, RelayError, Telemetry};
pub use sensor::{EnvironmentSensor, ParticulateSensor, SensorError};
pub use settings::{load, ConfigError, Endpoint, Placement, Settings, Units};
pub use time::{sync, ClockOffset, SessionClock, SntpConfig, Stamp, TimeSyncError, Timestamp};
