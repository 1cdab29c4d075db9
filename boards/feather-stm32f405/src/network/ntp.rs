#![deny(unsafe_code)]
#![deny(warnings)]
//! NTP datagrams over embassy-net UDP
//!
//! Only the exchange lives here; packet layout, retries and the timeout are
//! handled by `airq_core::time::sync`.

use defmt::{debug, Debug2Format};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack};
use hal_abstractions::NtpTransport;

use super::error::NetworkError;
use super::resolve;

const NTP_PORT: u16 = 123;

pub struct UdpNtp {
    stack: Stack<'static>,
}

impl UdpNtp {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }
}

impl NtpTransport for UdpNtp {
    type Error = NetworkError;

    async fn exchange(
        &mut self,
        server: &str,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<usize, NetworkError> {
        let server_ip = resolve(&self.stack, server).await?;
        let server_endpoint = IpEndpoint::new(server_ip, NTP_PORT);

        let mut rx_meta = [PacketMetadata::EMPTY; 2];
        let mut rx_buffer = [0u8; 64];
        let mut tx_meta = [PacketMetadata::EMPTY; 2];
        let mut tx_buffer = [0u8; 64];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| NetworkError::SocketError)?;

        socket
            .send_to(request, server_endpoint)
            .await
            .map_err(|_| NetworkError::SocketError)?;

        loop {
            let (len, from) = socket
                .recv_from(response)
                .await
                .map_err(|_| NetworkError::SocketError)?;
            if from.endpoint.addr == server_ip {
                return Ok(len);
            }
            debug!("Ignoring datagram from {}", Debug2Format(&from.endpoint));
        }
    }
}
