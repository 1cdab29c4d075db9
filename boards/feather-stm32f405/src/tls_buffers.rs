//! Connection buffers in main SRAM
//!
//! One outbound connection exists at a time (the Logflare POST), so a single
//! set of buffers is handed to the connector at boot and reused for every
//! request. Placing them in statics keeps 42 KB off the task stack.
//!
//! # Buffer Sizing
//!
//! **TLS read buffer (18 KB)**: maximum TLS 1.3 plaintext (16384 bytes) plus
//! the 5 byte record header, the 16 byte AES-128-GCM tag and padding.
//!
//! **TLS write buffer (16 KB)**: we control outgoing record sizes, so one
//! maximum record is enough.
//!
//! **TCP buffers (4 KB each)**: the W5500 keeps its own 8 KB per socket; the
//! stack only needs to hold one TLS record in flight.

#![deny(warnings)]

use static_cell::ConstStaticCell;

const TLS_READ_BUF_SIZE: usize = 18 * 1024;
const TLS_WRITE_BUF_SIZE: usize = 16 * 1024;
const TCP_BUF_SIZE: usize = 4 * 1024;

static TLS_READ_BUF: ConstStaticCell<[u8; TLS_READ_BUF_SIZE]> =
    ConstStaticCell::new([0; TLS_READ_BUF_SIZE]);
static TLS_WRITE_BUF: ConstStaticCell<[u8; TLS_WRITE_BUF_SIZE]> =
    ConstStaticCell::new([0; TLS_WRITE_BUF_SIZE]);
static TCP_RX_BUF: ConstStaticCell<[u8; TCP_BUF_SIZE]> = ConstStaticCell::new([0; TCP_BUF_SIZE]);
static TCP_TX_BUF: ConstStaticCell<[u8; TCP_BUF_SIZE]> = ConstStaticCell::new([0; TCP_BUF_SIZE]);

/// Exclusive handles to every connection buffer
pub struct SessionBuffers {
    pub tcp_rx: &'static mut [u8],
    pub tcp_tx: &'static mut [u8],
    pub tls_read: &'static mut [u8],
    pub tls_write: &'static mut [u8],
}

impl SessionBuffers {
    /// Claim the buffers. Returns `None` if they were already taken.
    pub fn take() -> Option<Self> {
        Some(Self {
            tcp_rx: TCP_RX_BUF.try_take()?,
            tcp_tx: TCP_TX_BUF.try_take()?,
            tls_read: TLS_READ_BUF.try_take()?,
            tls_write: TLS_WRITE_BUF.try_take()?,
        })
    }
}
