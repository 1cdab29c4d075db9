//! Network capability traits
//!
//! The board owns the actual stack (W5500 + embassy-net on the Feather).
//! Protocol logic above these traits (SNTP, HTTP) lives in `airq-core`
//! and stays testable on the host.

use core::future::Future;

use embedded_io_async::{Read, Write};

/// Credentials used when (re)joining the network
#[derive(Debug, Clone, Copy)]
pub struct LinkCredentials<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

/// Physical/data-link bring-up (Wi-Fi association, Ethernet + DHCP, ...)
pub trait NetworkLink {
    type Error: core::fmt::Debug;

    /// Whether the link currently has a usable address
    fn is_up(&self) -> bool;

    /// Try once to bring the link up.
    ///
    /// Wired boards may ignore `credentials`.
    fn connect(
        &mut self,
        credentials: &LinkCredentials<'_>,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}

/// One UDP request/response exchange with an NTP server on port 123
pub trait NtpTransport {
    type Error: core::fmt::Debug;

    /// Resolve `server`, send `request`, and wait for a single datagram.
    ///
    /// Returns the number of bytes written into `response`. Implementations
    /// must drop datagrams that did not come from the resolved server.
    fn exchange(
        &mut self,
        server: &str,
        request: &[u8],
        response: &mut [u8],
    ) -> impl Future<Output = Result<usize, Self::Error>>;
}

/// Remote stream endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remote<'a> {
    /// Hostname, used for DNS and TLS SNI
    pub host: &'a str,
    pub port: u16,
    /// Wrap the stream in TLS
    pub secure: bool,
}

/// Opens byte streams to remote hosts
///
/// The connection borrows the connector, which lets boards hand out
/// socket and TLS buffers they own without allocation.
pub trait TcpConnector {
    type Error: core::fmt::Debug;
    type Connection<'a>: Read + Write
    where
        Self: 'a;

    fn connect<'a>(
        &'a mut self,
        remote: &Remote<'_>,
    ) -> impl Future<Output = Result<Self::Connection<'a>, Self::Error>>;
}
