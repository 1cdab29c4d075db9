//! Poll/forward loop
//!
//! [`Station`] owns every collaborator and runs one iteration per
//! [`Station::step`]: link check, particulate poll, optional
//! temperature/pressure, stamp, render, send. Per-cycle errors are
//! contained in the [`Cycle`] outcome; nothing here ends the loop.

#[cfg(feature = "defmt")]
use defmt::{Debug2Format, Format};
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{MonotonicClock, NetworkLink, NtpTransport};

use crate::display::{render, Fault, Screen, Status, StatusDisplay};
use crate::reading::Reading;
use crate::relay::{Ack, RelayError, Telemetry};
use crate::sensor::{EnvironmentSensor, ParticulateSensor, SensorError};
use crate::settings::{ConfigError, Settings};
use crate::time::{self, SessionClock, SntpConfig};
use crate::timeout::with_timeout;

/// Bound on a single sensor bus read
pub const SENSOR_TIMEOUT_MS: u32 = 1000;

/// Reconnect policy when the link is found down
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    pub attempts: u32,
    /// Doubled after every failed attempt
    pub backoff_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 1000,
        }
    }
}

impl LinkConfig {
    fn backoff(&self, attempt: u32) -> u32 {
        self.backoff_ms.saturating_mul(1 << attempt.min(16))
    }
}

/// Outcome of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Cycle {
    /// Reading delivered
    Sent(Ack),
    /// Reading produced but the relay failed; it is not retried
    Dropped(RelayError),
    /// No valid sample this cycle
    SensorSkipped(SensorError),
    /// Link could not be brought up
    LinkDown,
}

/// Everything the station drives
pub struct Devices<P, E, T, S, M, D, L> {
    pub particulate: P,
    /// Absent when `ENABLE_SPA06` is off or the sensor failed to initialize
    pub environment: Option<E>,
    pub telemetry: T,
    pub display: S,
    pub mono: M,
    pub delay: D,
    pub link: L,
}

pub struct Station<'s, P, E, T, S, M, D, L> {
    settings: &'s Settings,
    particulate: P,
    environment: Option<E>,
    telemetry: T,
    display: S,
    mono: M,
    delay: D,
    link: L,
    link_config: LinkConfig,
    clock: SessionClock,
    status: Status,
    last: Option<Reading>,
}

impl<'s, P, E, T, S, M, D, L> Station<'s, P, E, T, S, M, D, L>
where
    P: ParticulateSensor,
    E: EnvironmentSensor,
    T: Telemetry,
    S: StatusDisplay,
    M: MonotonicClock,
    D: DelayNs,
    L: NetworkLink,
{
    pub fn new(settings: &'s Settings, devices: Devices<P, E, T, S, M, D, L>) -> Self {
        Self {
            settings,
            particulate: devices.particulate,
            environment: devices.environment,
            telemetry: devices.telemetry,
            display: devices.display,
            mono: devices.mono,
            delay: devices.delay,
            link: devices.link,
            link_config: LinkConfig::default(),
            clock: SessionClock::unsynced(),
            status: Status::default(),
            last: None,
        }
    }

    pub fn with_link_config(mut self, link_config: LinkConfig) -> Self {
        self.link_config = link_config;
        self
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Bring the link up, sync the clock once and announce the device
    ///
    /// Neither a failed link nor a failed sync stops the boot; the loop
    /// retries the link and readings go out unsynchronized.
    pub async fn boot<N: NtpTransport>(&mut self, ntp: &mut N, sntp: &SntpConfig<'_>) {
        let settings = self.settings;
        self.refresh();

        if !self.ensure_link().await {
            warn!("Starting without network; time stays unsynchronized");
            return;
        }

        let server_override;
        let sntp = match &settings.ntp_server {
            Some(server) => {
                server_override = [server.as_str()];
                SntpConfig {
                    servers: &server_override,
                    ..*sntp
                }
            }
            None => *sntp,
        };
        match time::sync(ntp, &self.mono, &mut self.delay, &sntp).await {
            Ok(offset) => self.clock = SessionClock::synced(offset),
            Err(e) => warn!("Time sync failed ({}), using local clock", e),
        }

        let stamp = self.clock.stamp(self.mono.now_micros());
        match self.telemetry.send_startup(settings, &stamp).await {
            Ok(_) => info!(
                "Air quality device starting in '{}'",
                settings.device_location.as_str()
            ),
            Err(e) => warn!("Startup event not delivered: {}", e),
        }
    }

    /// Run one iteration of the poll/forward loop
    pub async fn step(&mut self) -> Cycle {
        let settings = self.settings;

        if !self.ensure_link().await {
            self.status.fault = Some(Fault::NoNetwork);
            self.refresh();
            return Cycle::LinkDown;
        }

        let polled = with_timeout(&mut self.delay, SENSOR_TIMEOUT_MS, self.particulate.poll())
            .await
            .unwrap_or(Err(SensorError::Timeout));
        let sample = match polled {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Sensor read failed: {}", e);
                self.status.fault = Some(Fault::SensorError);
                self.refresh();
                return Cycle::SensorSkipped(e);
            }
        };

        let ambient = match self.environment.as_mut() {
            Some(sensor) => {
                match with_timeout(&mut self.delay, SENSOR_TIMEOUT_MS, sensor.measure())
                    .await
                    .unwrap_or(Err(SensorError::Timeout))
                {
                    Ok(ambient) => Some(ambient),
                    Err(e) => {
                        warn!("SPA06 read failed: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        let stamp = self.clock.stamp(self.mono.now_micros());
        let reading = Reading::new(&sample, settings.placement, ambient, stamp);
        self.last = Some(reading);
        self.status.fault = None;
        self.refresh();

        match self.telemetry.send(&reading, settings).await {
            Ok(ack) => {
                info!(
                    "Logged: PM2.5={} ({})",
                    reading.pm2_5,
                    reading.air_quality().label()
                );
                Cycle::Sent(ack)
            }
            Err(e) => {
                warn!("Failed to send to Logflare: {}", e);
                self.status.fault = Some(Fault::RelayFailed);
                self.refresh();
                Cycle::Dropped(e)
            }
        }
    }

    /// One iteration, then sleep for whatever is left of the interval
    pub async fn step_and_wait(&mut self) -> Cycle {
        let interval_ms = u64::from(self.settings.reading_interval_secs) * 1000;
        let started = self.mono.now_micros();

        let cycle = self.step().await;

        let elapsed = self.mono.millis_since(started);
        let remaining = interval_ms.saturating_sub(elapsed);
        debug!("Loop took {} ms, sleeping {} ms", elapsed, remaining);
        if remaining > 0 {
            self.delay
                .delay_ms(u32::try_from(remaining).unwrap_or(u32::MAX))
                .await;
        }
        cycle
    }

    pub async fn run(&mut self) -> ! {
        info!("Starting air quality monitoring...");
        loop {
            self.step_and_wait().await;
        }
    }

    async fn ensure_link(&mut self) -> bool {
        if self.link.is_up() {
            if !self.status.link_up {
                self.status.link_up = true;
                self.refresh();
            }
            return true;
        }

        let settings = self.settings;
        self.status.link_up = false;
        self.refresh();

        let credentials = settings.credentials();
        for attempt in 0..self.link_config.attempts {
            info!(
                "Connecting to {} (attempt {})",
                credentials.ssid,
                attempt + 1
            );
            match self.link.connect(&credentials).await {
                Ok(()) if self.link.is_up() => {
                    info!("Connected to {}", credentials.ssid);
                    self.status.link_up = true;
                    if self.status.fault == Some(Fault::NoNetwork) {
                        self.status.fault = None;
                    }
                    self.refresh();
                    return true;
                }
                Ok(()) => warn!("Link still down after connect"),
                Err(_e) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Connection failed: {}", Debug2Format(&_e));
                }
            }
            self.delay.delay_ms(self.link_config.backoff(attempt)).await;
        }
        false
    }

    fn refresh(&mut self) {
        let screen = render(self.last.as_ref(), &self.status, self.settings);
        self.display.show(&screen);
    }
}

/// What to show when settings could not be loaded
pub fn startup_failure(error: &ConfigError) -> Screen {
    let message = match error {
        ConfigError::MissingKey("CIRCUITPY_WIFI_SSID" | "CIRCUITPY_WIFI_PASSWORD") => {
            "WiFi not configured"
        }
        ConfigError::MissingKey("LOGFLARE_API_KEY" | "LOGFLARE_SOURCE_ID") => {
            "Logflare not configured"
        }
        ConfigError::NotFound => "settings.toml missing",
        _ => "Invalid settings",
    };
    Screen::error(message)
}
