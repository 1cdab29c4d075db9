//! Telemetry relay to Logflare
//!
//! One HTTP `POST` per reading. Delivery is at-most-once: a failed send is
//! reported to the caller and the reading is dropped. Nothing is queued.

use core::future::Future;

#[cfg(feature = "defmt")]
use defmt::{Debug2Format, Format};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, Write};
use hal_abstractions::TcpConnector;
use heapless::String;
use serde::Serialize;

use crate::reading::Reading;
use crate::settings::Settings;
use crate::time::Stamp;
use crate::timeout::with_timeout;

pub mod event;
pub mod http;

/// Largest event body
pub const BODY_CAPACITY: usize = 1536;

/// Largest request line plus headers
const HEAD_CAPACITY: usize = 768;

/// Bytes kept from the response; only the status line is needed
const RESPONSE_HEAD_LEN: usize = 128;

/// Relay settings
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Bound on connect + request + status line
    pub timeout_ms: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

/// Successful delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Ack {
    /// HTTP status, always 2xx
    pub status: u16,
    /// `http_seq_id` carried by the event
    pub seq: u32,
}

/// Telemetry relay errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum RelayError {
    /// DNS, TCP connect or TLS handshake failed
    Unreachable,
    /// Connection broke while sending or receiving
    Io,
    /// No response within the timeout
    Timeout,
    /// Response had no parsable status line
    InvalidResponse,
    /// Event does not fit the request buffer
    PayloadTooLarge,
    /// 401 / 403: API key or source rejected
    AuthRejected,
    /// 429
    RateLimited,
    /// Any other non-2xx client status
    Rejected { status: u16 },
    /// 5xx
    ServerError { status: u16 },
}

impl core::fmt::Display for RelayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unreachable => write!(f, "Logging endpoint unreachable"),
            Self::Io => write!(f, "Connection error"),
            Self::Timeout => write!(f, "Request timeout"),
            Self::InvalidResponse => write!(f, "Invalid response"),
            Self::PayloadTooLarge => write!(f, "Event too large"),
            Self::AuthRejected => write!(f, "Authentication rejected"),
            Self::RateLimited => write!(f, "Rate limited"),
            Self::Rejected { status } => write!(f, "Rejected with status {}", status),
            Self::ServerError { status } => write!(f, "Server error {}", status),
        }
    }
}

impl core::error::Error for RelayError {}

impl RelayError {
    /// Map a non-2xx status
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::AuthRejected,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError { status },
            _ => Self::Rejected { status },
        }
    }
}

/// Sink for readings
pub trait Telemetry {
    /// Forward one reading
    fn send(
        &mut self,
        reading: &Reading,
        settings: &Settings,
    ) -> impl Future<Output = Result<Ack, RelayError>>;

    /// Announce that the device has booted
    fn send_startup(
        &mut self,
        settings: &Settings,
        stamp: &Stamp,
    ) -> impl Future<Output = Result<Ack, RelayError>>;
}

/// Logflare HTTP ingestion client
pub struct LogflareRelay<C, D> {
    connector: C,
    delay: D,
    config: RelayConfig,
    seq: u32,
}

impl<C, D> LogflareRelay<C, D>
where
    C: TcpConnector,
    D: DelayNs,
{
    pub fn new(connector: C, delay: D, config: RelayConfig) -> Self {
        Self {
            connector,
            delay,
            config,
            seq: 0,
        }
    }

    /// `http_seq_id` of the most recent reading attempt
    pub fn last_seq(&self) -> u32 {
        self.seq
    }

    async fn post(&mut self, settings: &Settings, body: &[u8]) -> Result<u16, RelayError> {
        let mut head: String<HEAD_CAPACITY> = String::new();
        http::write_request(
            &mut head,
            &settings.endpoint,
            settings.logflare_source_id.as_str(),
            settings.logflare_api_key.as_str(),
            body.len(),
        )
        .map_err(|_| RelayError::PayloadTooLarge)?;

        let remote = settings.endpoint.remote();
        let connector = &mut self.connector;
        let exchange = async {
            let mut conn = connector.connect(&remote).await.map_err(|_e| {
                #[cfg(feature = "defmt")]
                defmt::warn!("Connect to {} failed: {}", remote.host, Debug2Format(&_e));
                RelayError::Unreachable
            })?;
            conn.write_all(head.as_bytes())
                .await
                .map_err(|_| RelayError::Io)?;
            conn.write_all(body)
                .await
                .map_err(|_| RelayError::Io)?;
            conn.flush().await.map_err(|_| RelayError::Io)?;

            let mut response = [0u8; RESPONSE_HEAD_LEN];
            let len = read_status_line(&mut conn, &mut response).await?;
            http::parse_status(&response[..len]).ok_or(RelayError::InvalidResponse)
        };

        with_timeout(&mut self.delay, self.config.timeout_ms, exchange)
            .await
            .map_err(|_| RelayError::Timeout)?
    }

    async fn deliver(&mut self, settings: &Settings, body: &[u8], seq: u32) -> Result<Ack, RelayError> {
        let status = self.post(settings, body).await?;
        if (200..300).contains(&status) {
            debug!("Logflare accepted event {} ({})", seq, status);
            Ok(Ack { status, seq })
        } else {
            Err(RelayError::from_status(status))
        }
    }
}

impl<C, D> Telemetry for LogflareRelay<C, D>
where
    C: TcpConnector,
    D: DelayNs,
{
    async fn send(&mut self, reading: &Reading, settings: &Settings) -> Result<Ack, RelayError> {
        // Every attempt consumes a sequence number, so duplicates and gaps
        // are visible on the dashboard
        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;

        let event = event::ReadingEvent::new(reading, settings, seq)
            .map_err(|_| RelayError::PayloadTooLarge)?;
        let mut body = [0u8; BODY_CAPACITY];
        let len = encode(&event, &mut body)?;
        self.deliver(settings, &body[..len], seq).await
    }

    async fn send_startup(&mut self, settings: &Settings, stamp: &Stamp) -> Result<Ack, RelayError> {
        let event =
            event::StartupEvent::new(settings, stamp).map_err(|_| RelayError::PayloadTooLarge)?;
        let mut body = [0u8; BODY_CAPACITY];
        let len = encode(&event, &mut body)?;
        let seq = self.seq;
        self.deliver(settings, &body[..len], seq).await
    }
}

fn encode<T: Serialize>(event: &T, body: &mut [u8]) -> Result<usize, RelayError> {
    serde_json_core::to_slice(event, body).map_err(|_| RelayError::PayloadTooLarge)
}

/// Read until the first CRLF, EOF, or a full buffer
async fn read_status_line<R: Read>(conn: &mut R, buf: &mut [u8]) -> Result<usize, RelayError> {
    let mut len = 0;
    while len < buf.len() {
        let n = conn.read(&mut buf[len..]).await.map_err(|_| RelayError::Io)?;
        if n == 0 {
            break;
        }
        len += n;
        if buf[..len].windows(2).any(|w| w == b"\r\n") {
            break;
        }
    }
    Ok(len)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::relay::event::tests::{reading, settings};
    use crate::timeout::tests::{InstantDelay, NeverDelay};
    use core::future::pending;
    use embassy_futures::block_on;
    use embedded_io_async::{ErrorKind, ErrorType};
    use hal_abstractions::Remote;
    use std::vec::Vec;

    /// In-memory server: records requests and replies with canned bytes
    #[derive(Default)]
    pub(crate) struct MemoryConnector {
        pub response: Vec<u8>,
        pub requests: Vec<Vec<u8>>,
        pub hosts: Vec<(std::string::String, u16, bool)>,
        pub refuse: bool,
        pub stall: bool,
    }

    impl MemoryConnector {
        pub(crate) fn replying(status_line: &str) -> Self {
            Self {
                response: std::format!("{}\r\ncontent-length: 0\r\n\r\n", status_line).into_bytes(),
                ..Self::default()
            }
        }

        pub(crate) fn request_text(&self, n: usize) -> std::string::String {
            std::string::String::from_utf8(self.requests[n].clone()).unwrap()
        }
    }

    pub(crate) struct MemoryConnection<'a> {
        sent: &'a mut Vec<u8>,
        response: &'a [u8],
        stall: bool,
    }

    impl TcpConnector for MemoryConnector {
        type Error = ErrorKind;
        type Connection<'a> = MemoryConnection<'a>;

        async fn connect<'a>(&'a mut self, remote: &Remote<'_>) -> Result<MemoryConnection<'a>, ErrorKind> {
            if self.refuse {
                return Err(ErrorKind::ConnectionRefused);
            }
            self.hosts.push((remote.host.into(), remote.port, remote.secure));
            self.requests.push(Vec::new());
            let sent = self.requests.last_mut().ok_or(ErrorKind::Other)?;
            Ok(MemoryConnection {
                sent,
                response: &self.response,
                stall: self.stall,
            })
        }
    }

    impl ErrorType for MemoryConnection<'_> {
        type Error = ErrorKind;
    }

    impl Read for MemoryConnection<'_> {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
            if self.stall {
                pending::<()>().await;
            }
            // Dribble the response a few bytes at a time
            let n = buf.len().min(self.response.len()).min(7);
            buf[..n].copy_from_slice(&self.response[..n]);
            self.response = &self.response[n..];
            Ok(n)
        }
    }

    impl Write for MemoryConnection<'_> {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }

        async fn flush(&mut self) -> Result<(), ErrorKind> {
            Ok(())
        }
    }

    fn relay(connector: MemoryConnector) -> LogflareRelay<MemoryConnector, NeverDelay> {
        LogflareRelay::new(connector, NeverDelay, RelayConfig::default())
    }

    #[test]
    fn test_send_posts_json_to_endpoint() {
        let mut relay = relay(MemoryConnector::replying("HTTP/1.1 200 OK"));
        let ack = block_on(relay.send(&reading(true, None), &settings())).unwrap();
        assert_eq!(ack, Ack { status: 200, seq: 1 });

        let c = &relay.connector;
        assert_eq!(c.hosts, [("logs.example".to_string(), 443u16, true)]);
        let request = c.request_text(0);
        let (head, body) = request.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("POST /ingest?source=src-1 HTTP/1.1\r\n"));
        assert!(head.contains("\r\nX-API-KEY: abc123\r\n"));
        assert!(head.contains(&std::format!("\r\nContent-Length: {}", body.len())));
        assert!(body.starts_with(r#"{"event_message":"Air quality reading from 'kitchen'""#));
        assert!(body.contains(r#""http_seq_id":1"#));
    }

    #[test]
    fn test_created_is_success() {
        let mut relay = relay(MemoryConnector::replying("HTTP/1.1 201 Created"));
        let ack = block_on(relay.send(&reading(true, None), &settings())).unwrap();
        assert_eq!(ack.status, 201);
    }

    #[test]
    fn test_unauthorized_is_auth_rejected() {
        for status in ["HTTP/1.1 401 Unauthorized", "HTTP/1.1 403 Forbidden"] {
            let mut relay = relay(MemoryConnector::replying(status));
            let result = block_on(relay.send(&reading(true, None), &settings()));
            assert_eq!(result, Err(RelayError::AuthRejected));
        }
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            ("HTTP/1.1 429 Too Many Requests", RelayError::RateLimited),
            ("HTTP/1.1 400 Bad Request", RelayError::Rejected { status: 400 }),
            ("HTTP/1.1 500 Internal Server Error", RelayError::ServerError { status: 500 }),
            ("HTTP/1.1 503 Unavailable", RelayError::ServerError { status: 503 }),
            ("garbage", RelayError::InvalidResponse),
        ];
        for (line, expected) in cases {
            let mut relay = relay(MemoryConnector::replying(line));
            let result = block_on(relay.send(&reading(true, None), &settings()));
            assert_eq!(result, Err(expected), "{}", line);
        }
    }

    #[test]
    fn test_connect_failure_is_unreachable() {
        let mut relay = relay(MemoryConnector {
            refuse: true,
            ..MemoryConnector::default()
        });
        let result = block_on(relay.send(&reading(true, None), &settings()));
        assert_eq!(result, Err(RelayError::Unreachable));
    }

    #[test]
    fn test_stalled_server_times_out() {
        let connector = MemoryConnector {
            stall: true,
            ..MemoryConnector::replying("HTTP/1.1 200 OK")
        };
        let mut relay = LogflareRelay::new(connector, InstantDelay::default(), RelayConfig::default());
        let result = block_on(relay.send(&reading(true, None), &settings()));
        assert_eq!(result, Err(RelayError::Timeout));
        assert_eq!(relay.delay.calls, [5000]);
    }

    #[test]
    fn test_empty_response_is_invalid() {
        let mut relay = relay(MemoryConnector::default());
        let result = block_on(relay.send(&reading(true, None), &settings()));
        assert_eq!(result, Err(RelayError::InvalidResponse));
    }

    #[test]
    fn test_sequence_counts_attempts_and_never_resends() {
        let mut relay = relay(MemoryConnector::replying("HTTP/1.1 500 Oops"));
        let first = block_on(relay.send(&reading(true, None), &settings()));
        assert!(first.is_err());

        relay.connector.response = b"HTTP/1.1 200 OK\r\n\r\n".to_vec();
        let ack = block_on(relay.send(&reading(true, None), &settings())).unwrap();
        assert_eq!(ack.seq, 2);

        // One request per send; the failed one was not repeated
        assert_eq!(relay.connector.requests.len(), 2);
        assert!(relay.connector.request_text(0).contains(r#""http_seq_id":1"#));
        assert!(relay.connector.request_text(1).contains(r#""http_seq_id":2"#));
    }

    #[test]
    fn test_startup_event() {
        let mut relay = relay(MemoryConnector::replying("HTTP/1.1 200 OK"));
        let stamp = reading(false, None).stamp;
        let ack = block_on(relay.send_startup(&settings(), &stamp)).unwrap();
        assert_eq!(ack.seq, 0);
        assert!(relay
            .connector
            .request_text(0)
            .contains("Air quality device starting in 'kitchen'"));
    }

    #[test]
    fn test_body_overflow_is_payload_too_large() {
        let s = settings();
        let event = event::ReadingEvent::new(&reading(true, None), &s, 1).unwrap();
        let mut small = [0u8; 64];
        assert_eq!(encode(&event, &mut small), Err(RelayError::PayloadTooLarge));
        let mut full = [0u8; BODY_CAPACITY];
        assert!(encode(&event, &mut full).is_ok());
    }
}
