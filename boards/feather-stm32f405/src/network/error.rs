#![deny(unsafe_code)]
#![deny(warnings)]
//! Network error types

use defmt::Format;

/// Errors from the board's network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum NetworkError {
    /// W5500 did not come out of reset
    ChipInit,
    /// DHCP did not complete in time
    LinkTimeout,
    /// DNS resolution failed
    DnsError,
    /// Socket bind/connect/read/write error
    SocketError,
    /// Connection buffers already claimed
    BuffersInUse,
    /// TLS handshake failed
    TlsHandshakeFailed,
    /// TLS record error after the handshake
    TlsProtocolError,
    /// TLS connection closed unexpectedly
    TlsConnectionClosed,
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ChipInit => write!(f, "Ethernet chip init failed"),
            Self::LinkTimeout => write!(f, "DHCP timeout"),
            Self::DnsError => write!(f, "DNS resolution failed"),
            Self::SocketError => write!(f, "Socket error"),
            Self::BuffersInUse => write!(f, "Connection buffers in use"),
            Self::TlsHandshakeFailed => write!(f, "TLS handshake failed"),
            Self::TlsProtocolError => write!(f, "TLS protocol error"),
            Self::TlsConnectionClosed => write!(f, "TLS connection closed"),
        }
    }
}

impl core::error::Error for NetworkError {}

impl embedded_io_async::Error for NetworkError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            Self::SocketError | Self::TlsConnectionClosed => {
                embedded_io_async::ErrorKind::BrokenPipe
            }
            Self::LinkTimeout => embedded_io_async::ErrorKind::TimedOut,
            Self::TlsProtocolError => embedded_io_async::ErrorKind::InvalidData,
            _ => embedded_io_async::ErrorKind::Other,
        }
    }
}

impl From<embedded_tls::TlsError> for NetworkError {
    fn from(e: embedded_tls::TlsError) -> Self {
        match e {
            embedded_tls::TlsError::ConnectionClosed => Self::TlsConnectionClosed,
            _ => Self::TlsProtocolError,
        }
    }
}
