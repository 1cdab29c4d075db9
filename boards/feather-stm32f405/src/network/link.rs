#![deny(unsafe_code)]
#![deny(warnings)]
//! Ethernet link state
//!
//! The W5500 has no association step: "connecting" means waiting for DHCP.

use defmt::info;
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};
use hal_abstractions::{LinkCredentials, NetworkLink};

use super::error::NetworkError;

const DHCP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct EthernetLink {
    stack: Stack<'static>,
}

impl EthernetLink {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }
}

impl NetworkLink for EthernetLink {
    type Error = NetworkError;

    fn is_up(&self) -> bool {
        self.stack.is_config_up()
    }

    async fn connect(&mut self, _credentials: &LinkCredentials<'_>) -> Result<(), NetworkError> {
        info!("Waiting for DHCP...");
        with_timeout(DHCP_TIMEOUT, self.stack.wait_config_up())
            .await
            .map_err(|_| NetworkError::LinkTimeout)?;
        info!("Network is UP!");

        if let Some(config) = self.stack.config_v4() {
            let octets = config.address.address().octets();
            info!(
                "IP: {}.{}.{}.{}",
                octets[0], octets[1], octets[2], octets[3]
            );

            if let Some(gateway) = config.gateway {
                let gw_octets = gateway.octets();
                info!(
                    "Gateway: {}.{}.{}.{}",
                    gw_octets[0], gw_octets[1], gw_octets[2], gw_octets[3]
                );
            }
        }
        Ok(())
    }
}
