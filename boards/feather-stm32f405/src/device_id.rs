#![deny(unsafe_code)]
#![deny(warnings)]
//! Identity derived from the STM32F405 96-bit unique device ID
//!
//! The UID is factory-programmed and stable across reboots, so the MAC
//! address (and therefore the DHCP lease) survives a reflash.

/// Get the STM32F405 unique device ID as a 24-character hex string
pub fn uid_hex() -> &'static str {
    embassy_stm32::uid::uid_hex()
}

/// Locally administered unicast MAC built from the UID
pub fn mac_address() -> [u8; 6] {
    mac_from_uid(embassy_stm32::uid::uid())
}

/// Seed for embassy-net's TCP sequence numbers and DHCP transaction IDs
pub fn stack_seed() -> u64 {
    seed_from_uid(embassy_stm32::uid::uid())
}

fn mac_from_uid(uid: &[u8; 12]) -> [u8; 6] {
    // Fold the 12 bytes into 5, keeping the lot number and wafer position
    let mut mac = [0x02, 0, 0, 0, 0, 0];
    for (i, byte) in uid.iter().enumerate() {
        mac[1 + i % 5] ^= byte;
    }
    mac
}

fn seed_from_uid(uid: &[u8; 12]) -> u64 {
    // FNV-1a
    uid.iter().fold(0xcbf2_9ce4_8422_2325_u64, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
