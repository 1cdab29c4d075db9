//! Hardware abstraction traits for the air-quality node
//!
//! This crate defines traits that abstract over hardware differences
//! between boards. BSPs implement these traits; `airq-core` consumes them.
//!
//! - **`clock`**: free-running monotonic time source
//! - **`network`**: link bring-up, NTP datagrams, TCP/TLS streams
//! - **`storage`**: where the `settings.toml` bytes come from

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod clock;
pub mod network;
pub mod storage;

pub use clock::MonotonicClock;
pub use network::{LinkCredentials, NetworkLink, NtpTransport, Remote, TcpConnector};
pub use storage::{EmbeddedSettings, SettingsStore, StoreError};
