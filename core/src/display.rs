//! Status surface
//!
//! [`render`] turns the latest reading and the device status into a
//! [`Screen`]: six text lines, each with a colour. It is pure, so the same
//! inputs always give the same screen. Boards push the result to whatever
//! surface they have through [`StatusDisplay`]; a failing surface never
//! affects the poll loop.

use core::fmt::Write;

#[cfg(feature = "defmt")]
use defmt::Format;
use heapless::String;

use crate::reading::Reading;
use crate::settings::{Settings, Units};

pub const LINE_CAPACITY: usize = 48;
pub const LINES: usize = 6;

/// 0xRRGGBB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Color(pub u32);

impl Color {
    pub const WHITE: Color = Color(0xFFFFFF);
    pub const GREEN: Color = Color(0x00FF00);
    pub const RED: Color = Color(0xFF0000);
    pub const CYAN: Color = Color(0x00FFFF);
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line {
    pub text: String<LINE_CAPACITY>,
    pub color: Color,
}

impl Line {
    fn new(color: Color, args: core::fmt::Arguments<'_>) -> Self {
        let mut text = String::new();
        let _ = Clip(&mut text).write_fmt(args);
        Self { text, color }
    }

    fn blank() -> Self {
        Self::default()
    }
}

/// Writer that drops whatever does not fit on a line
struct Clip<'a>(&'a mut String<LINE_CAPACITY>);

impl Write for Clip<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// The whole surface, top to bottom
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Screen {
    pub lines: [Line; LINES],
}

impl Screen {
    /// Single red message, used when startup cannot continue
    pub fn error(message: &str) -> Self {
        let mut screen = Screen::default();
        screen.lines[3] = Line::new(Color::RED, format_args!("{}", message));
        screen
    }
}

/// Last thing that went wrong, shown instead of raw error detail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Fault {
    NoNetwork,
    SensorError,
    RelayFailed,
}

impl Fault {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoNetwork => "No network",
            Self::SensorError => "Sensor error",
            Self::RelayFailed => "Upload failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Status {
    pub link_up: bool,
    pub fault: Option<Fault>,
}

/// Anything that can show a [`Screen`]
pub trait StatusDisplay {
    /// Replace everything on the surface with `screen`
    fn show(&mut self, screen: &Screen);
}

/// Lay out the status screen
pub fn render(reading: Option<&Reading>, status: &Status, settings: &Settings) -> Screen {
    let location = Line::new(
        Color::WHITE,
        format_args!("Location: {}", settings.device_location.as_str()),
    );

    let wifi = if status.link_up {
        Line::new(
            Color::GREEN,
            format_args!("WiFi: {}", settings.wifi_ssid.as_str()),
        )
    } else {
        Line::new(Color::RED, format_args!("WiFi: Disconnected"))
    };

    let (pm25, quality) = match reading {
        Some(r) => {
            let aq = r.air_quality();
            let color = Color(aq.rgb());
            (
                Line::new(color, format_args!("PM2.5: {}", r.pm2_5)),
                Line::new(color, format_args!("{}", aq.label())),
            )
        }
        None => (
            Line::new(Color::WHITE, format_args!("PM2.5: ---")),
            Line::new(Color::WHITE, format_args!("---")),
        ),
    };
    let quality = match status.fault {
        Some(fault) => Line::new(Color::RED, format_args!("{}", fault.message())),
        None => quality,
    };

    let (temperature, pressure) = match reading.and_then(|r| r.ambient) {
        Some(a) => match settings.display_units {
            Units::Metric => (
                Line::new(Color::CYAN, format_args!("Temp: {:.1} C", a.temperature_c)),
                Line::new(Color::CYAN, format_args!("Pressure: {:.1} hPa", a.pressure_hpa)),
            ),
            Units::Imperial => (
                Line::new(Color::CYAN, format_args!("Temp: {:.1} F", a.temperature_f())),
                Line::new(
                    Color::CYAN,
                    format_args!("Pressure: {:.2} inHg", a.pressure_inhg()),
                ),
            ),
        },
        None => (Line::blank(), Line::blank()),
    };

    Screen {
        lines: [location, wifi, pm25, quality, temperature, pressure],
    }
}
