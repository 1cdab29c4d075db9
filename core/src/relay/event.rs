//! Logflare event bodies
//!
//! ```json
//! {"event_message": "...", "timestamp": "2024-01-01T00:00:00Z", "metadata": {...}}
//! ```
//!
//! `timestamp` and `device_timestamp` are only sent once the clock has
//! been synchronized; otherwise Logflare stamps the event on arrival.
//! Field order in the structs is the order on the wire.

use core::fmt::Write;

use heapless::String;
use serde::Serialize;

use crate::reading::Reading;
use crate::settings::Settings;
use crate::time::{Iso8601, Stamp};

/// `event_message` capacity: fixed text plus a full `DEVICE_LOCATION`
const MESSAGE_CAPACITY: usize = 96;

#[derive(Debug, Serialize)]
pub struct ReadingEvent<'a> {
    event_message: String<MESSAGE_CAPACITY>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<Iso8601>,
    metadata: ReadingMetadata<'a>,
}

// Adafruit PM25 naming, which existing dashboards query: pm10 is PM1.0,
// pm100 is PM10
#[derive(Debug, Serialize)]
struct ReadingMetadata<'a> {
    location: &'a str,
    status: &'static str,
    pm10: u16,
    pm25: u16,
    pm100: u16,
    particles_03um: u16,
    particles_05um: u16,
    particles_10um: u16,
    particles_25um: u16,
    particles_50um: u16,
    particles_100um: u16,
    config: ConfigMeta<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_timestamp: Option<Iso8601>,
    http_seq_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature_c: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature_f: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pressure_hpa: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pressure_inhg: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct StartupEvent<'a> {
    event_message: String<MESSAGE_CAPACITY>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<Iso8601>,
    metadata: StartupMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct StartupMetadata<'a> {
    config: ConfigMeta<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_timestamp: Option<Iso8601>,
}

/// Device settings echoed with every event
#[derive(Debug, Serialize)]
struct ConfigMeta<'a> {
    wifi_ssid: &'a str,
    device_location: &'a str,
    device_environment: &'static str,
    reading_interval: u32,
    display_units: &'static str,
    spa06_enabled: bool,
}

impl<'a> ConfigMeta<'a> {
    fn new(settings: &'a Settings) -> Self {
        Self {
            wifi_ssid: settings.wifi_ssid.as_str(),
            device_location: settings.device_location.as_str(),
            device_environment: settings.placement.as_str(),
            reading_interval: settings.reading_interval_secs,
            display_units: settings.display_units.as_str(),
            spa06_enabled: settings.spa06_enabled,
        }
    }
}

impl<'a> ReadingEvent<'a> {
    /// Event for one reading. Fails only if the message overflows.
    pub fn new(reading: &Reading, settings: &'a Settings, seq: u32) -> Result<Self, core::fmt::Error> {
        let location = settings.device_location.as_str();
        let mut event_message = String::new();
        write!(event_message, "Air quality reading from '{}'", location)?;

        let ambient = reading.ambient.as_ref();
        Ok(Self {
            event_message,
            timestamp: synced_time(&reading.stamp),
            metadata: ReadingMetadata {
                location,
                status: reading.air_quality().label(),
                pm10: reading.pm1_0,
                pm25: reading.pm2_5,
                pm100: reading.pm10,
                particles_03um: reading.counts.um0_3,
                particles_05um: reading.counts.um0_5,
                particles_10um: reading.counts.um1_0,
                particles_25um: reading.counts.um2_5,
                particles_50um: reading.counts.um5_0,
                particles_100um: reading.counts.um10,
                config: ConfigMeta::new(settings),
                device_timestamp: synced_time(&reading.stamp),
                http_seq_id: seq,
                temperature_c: ambient.map(|a| rounded(a.temperature_c, 10.0)),
                temperature_f: ambient.map(|a| rounded(a.temperature_f(), 10.0)),
                pressure_hpa: ambient.map(|a| rounded(a.pressure_hpa, 10.0)),
                pressure_inhg: ambient.map(|a| rounded(a.pressure_inhg(), 100.0)),
            },
        })
    }
}

impl<'a> StartupEvent<'a> {
    /// One-off event sent at boot
    pub fn new(settings: &'a Settings, stamp: &Stamp) -> Result<Self, core::fmt::Error> {
        let mut event_message = String::new();
        write!(
            event_message,
            "Air quality device starting in '{}'",
            settings.device_location.as_str()
        )?;
        Ok(Self {
            event_message,
            timestamp: synced_time(stamp),
            metadata: StartupMetadata {
                config: ConfigMeta::new(settings),
                device_timestamp: synced_time(stamp),
            },
        })
    }
}

fn synced_time(stamp: &Stamp) -> Option<Iso8601> {
    stamp.synced.then(|| stamp.time.iso8601())
}

/// Round half away from zero to `1 / scale`. Non-finite values pass
/// through and serialize as `null`.
fn rounded(value: f32, scale: f32) -> f32 {
    if !value.is_finite() {
        return value;
    }
    let scaled = value * scale;
    let nudge = if scaled < 0.0 { -0.5 } else { 0.5 };
    ((scaled + nudge) as i32) as f32 / scale
}
