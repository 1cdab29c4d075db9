//! SNTP client
//!
//! One-shot synchronization at boot (RFC 4330). Tries each configured
//! server with retries and returns the offset between wall-clock time and
//! the board's monotonic counter.

#[cfg(feature = "defmt")]
use defmt::{Debug2Format, Format};
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{MonotonicClock, NtpTransport};

use super::{ClockOffset, Timestamp};
use crate::timeout::with_timeout;

/// Size of an NTP packet without extension fields
pub const NTP_PACKET_LEN: usize = 48;

/// LI=0, VN=3, Mode=3 (client)
const CLIENT_HEADER: u8 = 0x1B;

/// Mode field value of a server reply
const MODE_SERVER: u8 = 4;

/// Largest RTT/2 correction applied, in microseconds
///
/// Network RTT exceeding 2 seconds is unusual and likely an error.
const MAX_RTT_CORRECTION_MICROS: u64 = 1_000_000;

/// SNTP client settings
#[derive(Debug, Clone, Copy)]
pub struct SntpConfig<'a> {
    /// Servers tried in order
    pub servers: &'a [&'a str],
    /// Per-attempt timeout
    pub timeout_ms: u32,
    /// Attempts per server
    pub retry_count: usize,
    /// Pause between failed attempts
    pub retry_backoff_ms: u32,
    /// Maximum accepted stratum level
    ///
    /// Stratum 1 = primary servers (directly connected to stratum 0)
    /// Stratum 2 = secondary servers (synced to stratum 1)
    /// Stratum 16 = unsynchronized
    pub max_stratum: u8,
}

impl Default for SntpConfig<'static> {
    fn default() -> Self {
        Self {
            servers: &["pool.ntp.org", "time.google.com", "time.cloudflare.com"],
            timeout_ms: 5000,
            retry_count: 3,
            retry_backoff_ms: 2000,
            max_stratum: 3,
        }
    }
}

/// Time synchronization errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum TimeSyncError {
    /// DNS or socket failure talking to the server
    Unreachable,
    /// No reply within the timeout
    Timeout,
    /// Reply too short, wrong mode, or zero transmit time
    InvalidResponse,
    /// Server stratum too high or invalid
    BadStratum(u8),
    /// Every server and retry was exhausted
    AllServersFailed,
}

impl core::fmt::Display for TimeSyncError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unreachable => write!(f, "NTP server unreachable"),
            Self::Timeout => write!(f, "NTP request timed out"),
            Self::InvalidResponse => write!(f, "invalid NTP response"),
            Self::BadStratum(s) => write!(f, "NTP server stratum {} rejected", s),
            Self::AllServersFailed => write!(f, "all NTP servers failed"),
        }
    }
}

impl core::error::Error for TimeSyncError {}

/// Build the 48-byte client request
pub fn request_packet() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = CLIENT_HEADER;
    packet
}

/// Validate a server reply and extract its transmit timestamp
pub fn parse_reply(reply: &[u8], max_stratum: u8) -> Result<Timestamp, TimeSyncError> {
    if reply.len() < NTP_PACKET_LEN {
        return Err(TimeSyncError::InvalidResponse);
    }
    if reply[0] & 0x07 != MODE_SERVER {
        return Err(TimeSyncError::InvalidResponse);
    }

    let stratum = reply[1];
    if stratum == 0 || stratum > max_stratum {
        warn!("Invalid stratum {} (max {})", stratum, max_stratum);
        return Err(TimeSyncError::BadStratum(stratum));
    }

    // Transmit timestamp (bytes 40-47)
    let secs = u32::from_be_bytes([reply[40], reply[41], reply[42], reply[43]]);
    let frac = u32::from_be_bytes([reply[44], reply[45], reply[46], reply[47]]);
    if secs == 0 {
        return Err(TimeSyncError::InvalidResponse);
    }

    Ok(Timestamp::from_ntp(u64::from(secs), frac))
}

/// Synchronize once against the configured servers
///
/// Each attempt is bounded by `timeout_ms`; failed attempts are spaced by
/// `retry_backoff_ms`.
pub async fn sync<T, M, D>(
    transport: &mut T,
    mono: &M,
    delay: &mut D,
    config: &SntpConfig<'_>,
) -> Result<ClockOffset, TimeSyncError>
where
    T: NtpTransport,
    M: MonotonicClock,
    D: DelayNs,
{
    info!("Starting SNTP synchronization");
    for server in config.servers {
        for attempt in 0..config.retry_count {
            info!(
                "Attempting SNTP sync with {} (attempt {})",
                *server,
                attempt + 1
            );
            match request(transport, mono, delay, server, config).await {
                Ok(offset) => {
                    info!(
                        "SNTP sync successful: {}.{:06} UTC",
                        offset.wall.unix_secs,
                        offset.wall.micros
                    );
                    return Ok(offset);
                }
                Err(e) => {
                    warn!("SNTP sync failed: {}, retrying...", e);
                    delay.delay_ms(config.retry_backoff_ms).await;
                }
            }
        }
    }
    error!("All SNTP sync attempts failed");
    Err(TimeSyncError::AllServersFailed)
}

async fn request<T, M, D>(
    transport: &mut T,
    mono: &M,
    delay: &mut D,
    server: &str,
    config: &SntpConfig<'_>,
) -> Result<ClockOffset, TimeSyncError>
where
    T: NtpTransport,
    M: MonotonicClock,
    D: DelayNs,
{
    let packet = request_packet();
    let mut response = [0u8; NTP_PACKET_LEN];

    let sent_at = mono.now_micros();
    let len = with_timeout(
        delay,
        config.timeout_ms,
        transport.exchange(server, &packet, &mut response),
    )
    .await
    .map_err(|_| TimeSyncError::Timeout)?
    .map_err(|_e| {
        #[cfg(feature = "defmt")]
        defmt::debug!("NTP exchange with {} failed: {}", server, Debug2Format(&_e));
        TimeSyncError::Unreachable
    })?;
    let received_at = mono.now_micros();

    let wall = parse_reply(&response[..len.min(NTP_PACKET_LEN)], config.max_stratum)?;

    // RTT/2 correction, clamped
    let correction = (received_at.saturating_sub(sent_at) / 2).min(MAX_RTT_CORRECTION_MICROS);
    debug!("NTP RTT correction: {} us", correction);

    Ok(ClockOffset {
        wall: wall.saturating_add_micros(correction),
        mono_micros: received_at,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::time::timestamp::NTP_UNIX_OFFSET;
    use crate::timeout::tests::InstantDelay;
    use core::cell::Cell;
    use embassy_futures::block_on;
    use std::collections::VecDeque;
    use std::vec::Vec;

    pub(crate) struct StepClock {
        now: Cell<u64>,
        step: u64,
    }

    impl StepClock {
        pub(crate) fn new(start: u64, step: u64) -> Self {
            Self {
                now: Cell::new(start),
                step,
            }
        }
    }

    impl MonotonicClock for StepClock {
        fn now_micros(&self) -> u64 {
            let now = self.now.get();
            self.now.set(now + self.step);
            now
        }
    }

    /// Replays scripted replies and records which servers were asked
    #[derive(Default)]
    pub(crate) struct ScriptedNtp {
        pub replies: VecDeque<Result<Vec<u8>, ()>>,
        pub asked: Vec<std::string::String>,
    }

    impl NtpTransport for ScriptedNtp {
        type Error = ();

        async fn exchange(&mut self, server: &str, request: &[u8], response: &mut [u8]) -> Result<usize, ()> {
            assert_eq!(request[0], 0x1B);
            self.asked.push(server.into());
            let reply = self.replies.pop_front().unwrap_or(Err(()))?;
            response[..reply.len()].copy_from_slice(&reply);
            Ok(reply.len())
        }
    }

    pub(crate) fn reply(stratum: u8, unix_secs: u32) -> Vec<u8> {
        let mut r = std::vec![0u8; 48];
        r[0] = 0x1C; // LI=0, VN=3, Mode=4
        r[1] = stratum;
        let ntp = (unix_secs as u64 + NTP_UNIX_OFFSET) as u32;
        r[40..44].copy_from_slice(&ntp.to_be_bytes());
        r
    }

    #[test]
    fn test_request_packet() {
        let p = request_packet();
        assert_eq!(p[0], 0x1B);
        assert!(p[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_parse_valid_reply() {
        let ts = parse_reply(&reply(2, 1_700_000_000), 3).unwrap();
        assert_eq!(ts, Timestamp::new(1_700_000_000, 0));
    }

    #[test]
    fn test_parse_rejects_bad_stratum() {
        assert_eq!(
            parse_reply(&reply(0, 1_700_000_000), 3),
            Err(TimeSyncError::BadStratum(0))
        );
        assert_eq!(
            parse_reply(&reply(4, 1_700_000_000), 3),
            Err(TimeSyncError::BadStratum(4))
        );
    }

    #[test]
    fn test_parse_rejects_short_or_wrong_mode() {
        let r = reply(1, 1_700_000_000);
        assert_eq!(parse_reply(&r[..47], 3), Err(TimeSyncError::InvalidResponse));

        let mut client = r.clone();
        client[0] = 0x1B;
        assert_eq!(parse_reply(&client, 3), Err(TimeSyncError::InvalidResponse));
    }

    #[test]
    fn test_sync_applies_rtt_correction() {
        let mut ntp = ScriptedNtp::default();
        ntp.replies.push_back(Ok(reply(1, 1_700_000_000)));
        // Each clock read advances 40 ms, so RTT is 40 ms
        let mono = StepClock::new(1_000_000, 40_000);
        let mut delay = InstantDelay::default();

        let offset = block_on(sync(&mut ntp, &mono, &mut delay, &SntpConfig::default())).unwrap();
        assert_eq!(offset.wall, Timestamp::new(1_700_000_000, 20_000));
        assert_eq!(offset.mono_micros, 1_040_000);
    }

    #[test]
    fn test_sync_falls_back_to_next_server() {
        let mut ntp = ScriptedNtp::default();
        ntp.replies.push_back(Err(()));
        ntp.replies.push_back(Ok(reply(9, 1_700_000_000)));
        ntp.replies.push_back(Ok(reply(2, 1_700_000_123)));
        let mono = StepClock::new(0, 0);
        let mut delay = InstantDelay::default();
        let config = SntpConfig {
            servers: &["a.example", "b.example"],
            retry_count: 2,
            ..SntpConfig::default()
        };

        let offset = block_on(sync(&mut ntp, &mono, &mut delay, &config)).unwrap();
        assert_eq!(offset.wall.unix_secs, 1_700_000_123);
        assert_eq!(ntp.asked, ["a.example", "a.example", "b.example"]);
    }

    #[test]
    fn test_sync_all_servers_failed() {
        let mut ntp = ScriptedNtp::default();
        let mono = StepClock::new(0, 0);
        let mut delay = InstantDelay::default();
        let config = SntpConfig {
            servers: &["a.example"],
            retry_count: 3,
            retry_backoff_ms: 2000,
            ..SntpConfig::default()
        };

        let result = block_on(sync(&mut ntp, &mono, &mut delay, &config));
        assert_eq!(result, Err(TimeSyncError::AllServersFailed));
        assert_eq!(ntp.asked.len(), 3);
        // One backoff per failed attempt; the transport fails before the timeout
        assert_eq!(delay.calls, [2000, 2000, 2000]);
    }
}
