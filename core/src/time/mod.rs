//! Time source
//!
//! The wall clock is synchronized once at boot over SNTP and then free-runs
//! on the board's monotonic counter. If the sync fails the node keeps going
//! with an unsynchronized [`SessionClock`] and flags every reading.
//!
//! ## Custom Date/Time Conversions
//!
//! ISO-8601 formatting uses the O(1) calendar algorithms in `calendar`
//! instead of an external date crate.
//!
//! **Limitations:**
//! - UTC only (no timezone support)
//! - No leap seconds (NTP ignores them too)
//! - Dates before 1970 are not representable

mod calendar;
mod clock;
mod sntp;
mod timestamp;

pub use clock::{ClockOffset, SessionClock, Stamp};
pub use sntp::{parse_reply, request_packet, sync, SntpConfig, TimeSyncError, NTP_PACKET_LEN};
pub use timestamp::{Iso8601, Timestamp};

#[cfg(test)]
pub(crate) use sntp::tests as sntp_tests;
