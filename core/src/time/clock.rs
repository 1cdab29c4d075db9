//! Session clock: wall-clock time derived from the monotonic counter

#[cfg(feature = "defmt")]
use defmt::Format;

use super::Timestamp;

/// Wall-clock time observed at a known monotonic instant
///
/// Established once by [`sync`](super::sync) and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct ClockOffset {
    pub wall: Timestamp,
    pub mono_micros: u64,
}

impl ClockOffset {
    /// Wall-clock time at `mono_micros`
    pub fn at(&self, mono_micros: u64) -> Timestamp {
        self.wall
            .saturating_add_micros(mono_micros.saturating_sub(self.mono_micros))
    }
}

/// A reading's timestamp and whether it came from a synchronized clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Stamp {
    pub time: Timestamp,
    pub synced: bool,
}

/// Free-running clock for one boot session
///
/// Without a sync the clock counts from the Unix epoch plus uptime. Stamps
/// handed out never go backwards.
#[derive(Debug, Clone, Default)]
pub struct SessionClock {
    offset: Option<ClockOffset>,
    last: Option<Timestamp>,
}

impl SessionClock {
    pub const fn unsynced() -> Self {
        Self {
            offset: None,
            last: None,
        }
    }

    pub const fn synced(offset: ClockOffset) -> Self {
        Self {
            offset: Some(offset),
            last: None,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.offset.is_some()
    }

    pub fn offset(&self) -> Option<&ClockOffset> {
        self.offset.as_ref()
    }

    /// Timestamp for a reading taken at `mono_micros`
    pub fn stamp(&mut self, mono_micros: u64) -> Stamp {
        let raw = match &self.offset {
            Some(offset) => offset.at(mono_micros),
            None => Timestamp::from_micros(mono_micros),
        };
        let time = match self.last {
            Some(last) if raw < last => last,
            _ => raw,
        };
        self.last = Some(time);
        Stamp {
            time,
            synced: self.offset.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset() -> ClockOffset {
        ClockOffset {
            wall: Timestamp::new(1_700_000_000, 500_000),
            mono_micros: 2_000_000,
        }
    }

    #[test]
    fn test_offset_tracks_monotonic_time() {
        let o = offset();
        assert_eq!(o.at(2_000_000), Timestamp::new(1_700_000_000, 500_000));
        assert_eq!(o.at(12_750_000), Timestamp::new(1_700_000_011, 250_000));
    }

    #[test]
    fn test_synced_stamp() {
        let mut clock = SessionClock::synced(offset());
        let stamp = clock.stamp(3_000_000);
        assert!(stamp.synced);
        assert_eq!(stamp.time, Timestamp::new(1_700_000_001, 500_000));
    }

    #[test]
    fn test_unsynced_counts_from_epoch() {
        let mut clock = SessionClock::unsynced();
        let stamp = clock.stamp(90_000_001);
        assert!(!stamp.synced);
        assert_eq!(stamp.time, Timestamp::new(90, 1));
    }

    #[test]
    fn test_stamps_never_decrease() {
        let mut clock = SessionClock::synced(offset());
        let mut prev = clock.stamp(10_000_000).time;
        for mono in [20_000_000, 15_000_000, 1_000_000, 20_000_001, 30_000_000] {
            let now = clock.stamp(mono).time;
            assert!(now >= prev);
            prev = now;
        }
        assert_eq!(prev, Timestamp::new(1_700_000_028, 500_000));
    }
}
