//! Wall-clock timestamps

use core::fmt::{self, Write};

#[cfg(feature = "defmt")]
use defmt::Format;
use heapless::String;
use serde::ser::{Error as _, Serialize, Serializer};

use super::calendar::CivilTime;

/// NTP epoch offset (1900-01-01 to 1970-01-01 in seconds)
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

const MICROS_PER_SEC: u64 = 1_000_000;

/// Timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Timestamp {
    /// Unix timestamp in seconds since epoch (1970-01-01 00:00:00 UTC)
    pub unix_secs: u64,
    /// Microseconds component (0-999,999)
    pub micros: u32,
}

impl Timestamp {
    pub const fn new(unix_secs: u64, micros: u32) -> Self {
        Self { unix_secs, micros }
    }

    /// Convert from NTP timestamp (seconds since 1900-01-01)
    pub fn from_ntp(ntp_secs: u64, ntp_frac: u32) -> Self {
        let unix_secs = ntp_secs.saturating_sub(NTP_UNIX_OFFSET);
        // NTP fraction is in units of 2^-32 seconds
        let micros = ((ntp_frac as u64 * MICROS_PER_SEC) >> 32) as u32;
        Self::new(unix_secs, micros)
    }

    pub const fn from_micros(total: u64) -> Self {
        Self::new(total / MICROS_PER_SEC, (total % MICROS_PER_SEC) as u32)
    }

    pub const fn as_micros(&self) -> u64 {
        self.unix_secs
            .saturating_mul(MICROS_PER_SEC)
            .saturating_add(self.micros as u64)
    }

    pub const fn saturating_add_micros(&self, micros: u64) -> Self {
        Self::from_micros(self.as_micros().saturating_add(micros))
    }

    /// ISO-8601 UTC form, `YYYY-MM-DDTHH:MM:SSZ`
    pub fn iso8601(&self) -> Iso8601 {
        Iso8601(CivilTime::from_unix(self.unix_secs))
    }
}

/// Display adapter returned by [`Timestamp::iso8601`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iso8601(CivilTime);

impl fmt::Display for Iso8601 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.0;
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            t.year, t.month, t.day, t.hour, t.minute, t.second
        )
    }
}

impl Serialize for Iso8601 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut text: String<24> = String::new();
        write!(text, "{}", self).map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }
}
