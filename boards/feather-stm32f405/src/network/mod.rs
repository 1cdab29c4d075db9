#![deny(warnings)]
//! Board implementations of the `hal-abstractions` network traits
//!
//! - **`link`**: DHCP on the W5500 as a `NetworkLink`
//! - **`ntp`**: UDP exchange as an `NtpTransport`
//! - **`tls`**: TCP/TLS 1.3 streams as a `TcpConnector`
//! - **`socket`**: `embedded-io-async` wrapper around `TcpSocket`
//!
//! The embassy-net `Stack` is `Copy`; every type here holds its own handle.

mod error;
mod link;
mod ntp;
mod socket;
mod tls;

use defmt::{error, Debug2Format};
use embassy_net::dns::DnsQueryType;
use embassy_net::{IpAddress, Stack};

pub use error::NetworkError;
pub use link::EthernetLink;
pub use ntp::UdpNtp;
pub use tls::StackConnector;

/// First A record for `host`
async fn resolve(stack: &Stack<'static>, host: &str) -> Result<IpAddress, NetworkError> {
    stack
        .dns_query(host, DnsQueryType::A)
        .await
        .map_err(|e| {
            error!("DNS query for {} failed: {:?}", host, Debug2Format(&e));
            NetworkError::DnsError
        })?
        .first()
        .copied()
        .ok_or_else(|| {
            error!("DNS returned no results for {}", host);
            NetworkError::DnsError
        })
}
