#![deny(unsafe_code)]
#![deny(warnings)]
//! Outbound connections for the Logflare relay
//!
//! [`StackConnector`] resolves the host, opens a TCP socket and, for
//! `https` endpoints, runs a TLS 1.3 handshake with `embedded-tls`.
//!
//! # Limitations
//!
//! - Certificate verification is disabled (`NoVerify`)
//! - One connection at a time; the buffers in `tls_buffers` are reused

use defmt::{debug, error, info, Debug2Format};
use embassy_net::{IpEndpoint, Stack};
use embedded_io_async::{ErrorType, Read, Write};
use embedded_tls::{
    Aes128GcmSha256, CryptoProvider, NoVerify, TlsConfig, TlsConnection, TlsContext, TlsVerifier,
};
use hal_abstractions::{Remote, TcpConnector};

use crate::tls_buffers::SessionBuffers;

use super::error::NetworkError;
use super::resolve;
use super::socket::AsyncTcpSocket;

/// Simple crypto provider that wraps an RNG for TLS operations
struct SimpleCryptoProvider<RNG> {
    rng: RNG,
    verifier: NoVerify,
}

impl<RNG> SimpleCryptoProvider<RNG> {
    fn new(rng: RNG) -> Self {
        Self {
            rng,
            verifier: NoVerify,
        }
    }
}

impl<RNG> CryptoProvider for SimpleCryptoProvider<RNG>
where
    RNG: rand_core::CryptoRngCore,
{
    type CipherSuite = Aes128GcmSha256;
    type Signature = &'static [u8];

    fn rng(&mut self) -> impl rand_core::CryptoRngCore {
        &mut self.rng
    }

    fn verifier(
        &mut self,
    ) -> Result<&mut impl TlsVerifier<Self::CipherSuite>, embedded_tls::TlsError> {
        Ok(&mut self.verifier)
    }
}

/// An open stream, plain or encrypted
pub enum Session<'a> {
    Plain(AsyncTcpSocket<'a>),
    Secure(TlsConnection<'a, AsyncTcpSocket<'a>, Aes128GcmSha256>),
}

impl ErrorType for Session<'_> {
    type Error = NetworkError;
}

impl Read for Session<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self {
            Self::Plain(socket) => socket.read(buf).await,
            Self::Secure(tls) => Ok(tls.read(buf).await?),
        }
    }
}

impl Write for Session<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        match self {
            Self::Plain(socket) => socket.write(buf).await,
            Self::Secure(tls) => Ok(tls.write(buf).await?),
        }
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        match self {
            Self::Plain(socket) => socket.flush().await,
            Self::Secure(tls) => Ok(tls.flush().await?),
        }
    }
}

/// TCP/TLS connector over the embassy-net stack
pub struct StackConnector<RNG> {
    stack: Stack<'static>,
    rng: RNG,
    buffers: SessionBuffers,
}

impl<RNG> StackConnector<RNG>
where
    RNG: rand_core::RngCore + rand_core::CryptoRng,
{
    pub fn new(stack: Stack<'static>, rng: RNG, buffers: SessionBuffers) -> Self {
        debug!(
            "Connection buffers: tls read={} write={}, tcp rx={} tx={}",
            buffers.tls_read.len(),
            buffers.tls_write.len(),
            buffers.tcp_rx.len(),
            buffers.tcp_tx.len()
        );
        Self {
            stack,
            rng,
            buffers,
        }
    }
}

impl<RNG> TcpConnector for StackConnector<RNG>
where
    RNG: rand_core::RngCore + rand_core::CryptoRng,
{
    type Error = NetworkError;
    type Connection<'a>
        = Session<'a>
    where
        Self: 'a;

    async fn connect<'a>(&'a mut self, remote: &Remote<'_>) -> Result<Session<'a>, NetworkError> {
        let addr = resolve(&self.stack, remote.host).await?;
        let endpoint = IpEndpoint::new(addr, remote.port);

        let SessionBuffers {
            tcp_rx,
            tcp_tx,
            tls_read,
            tls_write,
        } = &mut self.buffers;

        let mut socket = AsyncTcpSocket::new(self.stack, tcp_rx, tcp_tx);
        socket.connect(endpoint).await?;
        debug!("TCP connection established to {}", Debug2Format(&endpoint));

        if !remote.secure {
            return Ok(Session::Plain(socket));
        }

        let config = TlsConfig::new().with_server_name(remote.host);
        let mut tls = TlsConnection::new(socket, tls_read, tls_write);
        let provider = SimpleCryptoProvider::new(&mut self.rng);
        tls.open(TlsContext::new(&config, provider))
            .await
            .map_err(|e| {
                error!("TLS handshake failed: {:?}", Debug2Format(&e));
                NetworkError::TlsHandshakeFailed
            })?;

        info!("TLS 1.3 session open with {}", remote.host);
        Ok(Session::Secure(tls))
    }
}
