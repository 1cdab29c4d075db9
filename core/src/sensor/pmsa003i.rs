//! Plantower PMSA003I particulate sensor over I2C
//!
//! Every read returns the latest 32-byte frame:
//!
//! | bytes  | field                                   |
//! |--------|-----------------------------------------|
//! | 0..2   | start bytes `0x42 0x4D`                 |
//! | 2..4   | frame length (28)                       |
//! | 4..10  | PM1.0 / PM2.5 / PM10, standard          |
//! | 10..16 | PM1.0 / PM2.5 / PM10, environmental     |
//! | 16..28 | particle counts >0.3 .. >10 µm per 0.1L |
//! | 28..30 | reserved                                |
//! | 30..32 | checksum, sum of bytes 0..30            |
//!
//! All fields are big-endian `u16`.

use embedded_hal_async::i2c::I2c;

use super::{ParticulateSensor, SensorError};
use crate::reading::{Concentrations, ParticleCounts, ParticulateSample};

/// Fixed 7-bit address
pub const PMSA003I_ADDR: u8 = 0x12;

pub const FRAME_LEN: usize = 32;

const START_BYTES: [u8; 2] = [0x42, 0x4D];

/// Length field value: everything after the length field
const PAYLOAD_LEN: u16 = 28;

pub struct Pmsa003i<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Pmsa003i<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            address: PMSA003I_ADDR,
        }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> ParticulateSensor for Pmsa003i<I2C> {
    async fn poll(&mut self) -> Result<ParticulateSample, SensorError> {
        let mut frame = [0u8; FRAME_LEN];
        self.i2c
            .read(self.address, &mut frame)
            .await
            .map_err(|_| SensorError::Bus)?;
        decode_frame(&frame)
    }
}

/// Validate and decode a raw frame
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Result<ParticulateSample, SensorError> {
    if frame[..2] != START_BYTES {
        return Err(SensorError::BadHeader);
    }
    if word(frame, 1) != PAYLOAD_LEN {
        return Err(SensorError::BadLength);
    }
    let sum = frame[..30]
        .iter()
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)));
    if sum != word(frame, 15) {
        return Err(SensorError::BadChecksum);
    }

    Ok(ParticulateSample {
        standard: Concentrations {
            pm1_0: word(frame, 2),
            pm2_5: word(frame, 3),
            pm10: word(frame, 4),
        },
        environmental: Concentrations {
            pm1_0: word(frame, 5),
            pm2_5: word(frame, 6),
            pm10: word(frame, 7),
        },
        counts: ParticleCounts {
            um0_3: word(frame, 8),
            um0_5: word(frame, 9),
            um1_0: word(frame, 10),
            um2_5: word(frame, 11),
            um5_0: word(frame, 12),
            um10: word(frame, 13),
        },
    })
}

/// The `n`th big-endian word of the frame
fn word(frame: &[u8; FRAME_LEN], n: usize) -> u16 {
    u16::from_be_bytes([frame[2 * n], frame[2 * n + 1]])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sensor::tests::FakeI2c;
    use embassy_futures::block_on;

    /// Well-formed frame: 13 data words then a valid checksum
    pub(crate) fn frame(words: [u16; 13]) -> [u8; FRAME_LEN] {
        let mut f = [0u8; FRAME_LEN];
        f[0] = 0x42;
        f[1] = 0x4D;
        f[2..4].copy_from_slice(&PAYLOAD_LEN.to_be_bytes());
        for (i, w) in words.iter().enumerate() {
            f[4 + 2 * i..6 + 2 * i].copy_from_slice(&w.to_be_bytes());
        }
        let sum = f[..30].iter().fold(0u16, |a, b| a.wrapping_add(u16::from(*b)));
        f[30..].copy_from_slice(&sum.to_be_bytes());
        f
    }

    pub(crate) fn typical() -> [u8; FRAME_LEN] {
        frame([8, 12, 18, 7, 11, 16, 1500, 420, 90, 6, 2, 0, 0])
    }

    pub(crate) fn bus_with(frame: [u8; FRAME_LEN]) -> FakeI2c {
        let mut bus = FakeI2c::new(PMSA003I_ADDR);
        bus.regs[..FRAME_LEN].copy_from_slice(&frame);
        bus
    }

    #[test]
    fn test_decode_well_formed_frame() {
        let sample = decode_frame(&typical()).unwrap();
        assert_eq!(sample.standard.pm2_5, 12);
        assert_eq!(sample.standard.pm10, 18);
        assert_eq!(sample.environmental.pm1_0, 7);
        assert_eq!(sample.counts.um0_3, 1500);
        assert_eq!(sample.counts.um5_0, 2);
    }

    #[test]
    fn test_bad_header() {
        let mut f = typical();
        f[0] = 0x00;
        assert_eq!(decode_frame(&f), Err(SensorError::BadHeader));
    }

    #[test]
    fn test_bad_length() {
        let mut f = typical();
        f[3] = 20;
        assert_eq!(decode_frame(&f), Err(SensorError::BadLength));
    }

    #[test]
    fn test_bad_checksum() {
        let mut f = typical();
        f[7] ^= 0x01; // corrupt PM2.5 standard
        assert_eq!(decode_frame(&f), Err(SensorError::BadChecksum));
    }

    #[test]
    fn test_all_zero_frame_is_rejected() {
        assert_eq!(decode_frame(&[0u8; FRAME_LEN]), Err(SensorError::BadHeader));
    }

    #[test]
    fn test_poll_reads_frame_from_bus() {
        let mut sensor = Pmsa003i::new(bus_with(typical()));
        let sample = block_on(sensor.poll()).unwrap();
        assert_eq!(sample.standard.pm2_5, 12);
        assert_eq!(sample.standard.pm10, 18);
    }

    #[test]
    fn test_poll_bus_error() {
        let mut bus = bus_with(typical());
        bus.fail = true;
        let mut sensor = Pmsa003i::new(bus);
        assert_eq!(block_on(sensor.poll()), Err(SensorError::Bus));
    }
}
