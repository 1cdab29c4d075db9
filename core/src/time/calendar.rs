//! Calendar date/time conversions using O(1) algorithms
//!
//! Implements Howard Hinnant's civil_from_days algorithm.
//! Reference: http://howardhinnant.github.io/date_algorithms.html
//!
//! Valid for every date in the proleptic Gregorian calendar from 1970 on.
//! UTC only, no leap seconds (NTP ignores them too).

const SECONDS_PER_DAY: u64 = 86_400;

/// Broken-down UTC time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilTime {
    pub year: u32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilTime {
    /// Split Unix seconds into a calendar date and time of day
    pub fn from_unix(unix_secs: u64) -> Self {
        let days_since_epoch = unix_secs / SECONDS_PER_DAY;
        let secs_today = unix_secs % SECONDS_PER_DAY;
        let (year, month, day) = civil_from_days(days_since_epoch);

        Self {
            year,
            month,
            day,
            hour: (secs_today / 3600) as u8,
            minute: ((secs_today % 3600) / 60) as u8,
            second: (secs_today % 60) as u8,
        }
    }
}

/// Convert days since Unix epoch to civil date (year, month, day)
fn civil_from_days(days_since_epoch: u64) -> (u32, u8, u8) {
    // Shift epoch from 1970-01-01 to 0000-03-01 so the leap day ends the year.
    // Days are unsigned here so the era is never negative.
    let z = days_since_epoch + 719_468;

    let era = z / 146_097;
    let doe = (z - era * 146_097) as u32; // day of era [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365; // [0, 399]
    let y = u64::from(yoe) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11], 0 = March
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let year = if m <= 2 { y + 1 } else { y };

    (year as u32, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        let t = CivilTime::from_unix(0);
        assert_eq!(
            t,
            CivilTime {
                year: 1970,
                month: 1,
                day: 1,
                hour: 0,
                minute: 0,
                second: 0
            }
        );
    }

    #[test]
    fn test_known_dates() {
        let cases = [
            (946_684_800u64, (2000, 1, 1, 0, 0, 0)),
            (951_782_400, (2000, 2, 29, 0, 0, 0)),
            (1_704_067_200, (2024, 1, 1, 0, 0, 0)),
            (1_709_164_800, (2024, 2, 29, 0, 0, 0)),
            (2_147_483_647, (2038, 1, 19, 3, 14, 7)),
            (4_102_444_800, (2100, 1, 1, 0, 0, 0)),
            // 2100 is not a leap year
            (4_107_542_400, (2100, 3, 1, 0, 0, 0)),
        ];

        for (unix_secs, expected) in cases {
            let t = CivilTime::from_unix(unix_secs);
            assert_eq!(
                (t.year, t.month, t.day, t.hour, t.minute, t.second),
                expected,
                "timestamp {}",
                unix_secs
            );
        }
    }

    #[test]
    fn test_end_of_century() {
        let t = CivilTime::from_unix(946684799);
        assert_eq!(
            t,
            CivilTime {
                year: 1999,
                month: 12,
                day: 31,
                hour: 23,
                minute: 59,
                second: 59
            }
        );
    }
}
