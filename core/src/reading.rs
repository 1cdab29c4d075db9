//! Reading records and derived values

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::settings::Placement;
use crate::time::Stamp;

/// PM1.0 / PM2.5 / PM10 mass concentrations in µg/m³
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Concentrations {
    pub pm1_0: u16,
    pub pm2_5: u16,
    pub pm10: u16,
}

/// Particles per 0.1 L of air above each diameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct ParticleCounts {
    pub um0_3: u16,
    pub um0_5: u16,
    pub um1_0: u16,
    pub um2_5: u16,
    pub um5_0: u16,
    pub um10: u16,
}

/// One decoded particulate sensor frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct ParticulateSample {
    /// CF=1, factory calibrated
    pub standard: Concentrations,
    /// Atmospheric environment
    pub environmental: Concentrations,
    pub counts: ParticleCounts,
}

impl ParticulateSample {
    pub fn concentrations(&self, placement: Placement) -> Concentrations {
        match placement {
            Placement::Indoor => self.standard,
            Placement::Outdoor => self.environmental,
        }
    }
}

/// Temperature and pressure from the optional barometer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Ambient {
    pub temperature_c: f32,
    pub pressure_hpa: f32,
}

impl Ambient {
    pub fn temperature_f(&self) -> f32 {
        celsius_to_fahrenheit(self.temperature_c)
    }

    pub fn pressure_inhg(&self) -> f32 {
        hpa_to_inhg(self.pressure_hpa)
    }
}

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn hpa_to_inhg(hpa: f32) -> f32 {
    hpa * 0.02953
}

/// A timestamped sample ready for the relay and the screen
///
/// Only built from a frame that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Reading {
    pub pm1_0: u16,
    pub pm2_5: u16,
    pub pm10: u16,
    pub counts: ParticleCounts,
    pub ambient: Option<Ambient>,
    pub stamp: Stamp,
}

impl Reading {
    pub fn new(
        sample: &ParticulateSample,
        placement: Placement,
        ambient: Option<Ambient>,
        stamp: Stamp,
    ) -> Self {
        let Concentrations { pm1_0, pm2_5, pm10 } = sample.concentrations(placement);
        Self {
            pm1_0,
            pm2_5,
            pm10,
            counts: sample.counts,
            ambient,
            stamp,
        }
    }

    pub fn air_quality(&self) -> AirQuality {
        AirQuality::from_pm2_5(self.pm2_5)
    }
}

/// Air-quality band for a PM2.5 concentration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum AirQuality {
    Excellent,
    Good,
    Moderate,
    Unhealthy,
    Hazardous,
}

impl AirQuality {
    pub fn from_pm2_5(pm2_5: u16) -> Self {
        match pm2_5 {
            0..=12 => Self::Excellent,
            13..=35 => Self::Good,
            36..=55 => Self::Moderate,
            56..=150 => Self::Unhealthy,
            _ => Self::Hazardous,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Unhealthy => "Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }

    /// 0xRRGGBB
    pub fn rgb(&self) -> u32 {
        match self {
            Self::Excellent => 0x00FF00,
            Self::Good => 0xFFFF00,
            Self::Moderate => 0xFF8800,
            Self::Unhealthy => 0xFF0000,
            Self::Hazardous => 0xFF00FF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Timestamp;

    fn sample() -> ParticulateSample {
        ParticulateSample {
            standard: Concentrations {
                pm1_0: 8,
                pm2_5: 12,
                pm10: 18,
            },
            environmental: Concentrations {
                pm1_0: 7,
                pm2_5: 11,
                pm10: 16,
            },
            counts: ParticleCounts {
                um0_3: 1500,
                um0_5: 420,
                um1_0: 90,
                um2_5: 6,
                um5_0: 2,
                um10: 0,
            },
        }
    }

    fn stamp() -> Stamp {
        Stamp {
            time: Timestamp::new(1_700_000_000, 0),
            synced: true,
        }
    }

    #[test]
    fn test_placement_selects_concentrations() {
        let indoor = Reading::new(&sample(), Placement::Indoor, None, stamp());
        assert_eq!((indoor.pm1_0, indoor.pm2_5, indoor.pm10), (8, 12, 18));

        let outdoor = Reading::new(&sample(), Placement::Outdoor, None, stamp());
        assert_eq!((outdoor.pm1_0, outdoor.pm2_5, outdoor.pm10), (7, 11, 16));
        assert_eq!(outdoor.counts.um0_3, 1500);
    }

    #[test]
    fn test_air_quality_bands() {
        let cases = [
            (0, AirQuality::Excellent),
            (12, AirQuality::Excellent),
            (13, AirQuality::Good),
            (35, AirQuality::Good),
            (36, AirQuality::Moderate),
            (55, AirQuality::Moderate),
            (56, AirQuality::Unhealthy),
            (150, AirQuality::Unhealthy),
            (151, AirQuality::Hazardous),
            (999, AirQuality::Hazardous),
        ];
        for (pm, band) in cases {
            assert_eq!(AirQuality::from_pm2_5(pm), band, "pm2.5 = {}", pm);
        }
        assert_eq!(AirQuality::Moderate.label(), "Moderate");
        assert_eq!(AirQuality::Moderate.rgb(), 0xFF8800);
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert!((celsius_to_fahrenheit(21.5) - 70.7).abs() < 1e-4);
        assert!((hpa_to_inhg(1013.25) - 29.921).abs() < 1e-3);
    }
}
