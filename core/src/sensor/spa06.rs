//! Goertek SPA06-003 barometric pressure and temperature sensor over I2C
//!
//! The sensor runs in continuous background mode at one measurement per
//! second with 8x oversampling for both channels. Raw readings are
//! compensated with the factory calibration coefficients read at init.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use super::{EnvironmentSensor, SensorError};
use crate::reading::Ambient;

/// Default 7-bit address (SDO high)
pub const SPA06_ADDR: u8 = 0x77;

const PRODUCT_ID: u8 = 0x11;

const REG_PSR_B2: u8 = 0x00;
const REG_PRS_CFG: u8 = 0x06;
const REG_TMP_CFG: u8 = 0x07;
const REG_MEAS_CFG: u8 = 0x08;
const REG_CFG: u8 = 0x09;
const REG_RESET: u8 = 0x0C;
const REG_ID: u8 = 0x0D;
const REG_COEF: u8 = 0x10;

const COEF_LEN: usize = 21;

/// MEAS_CFG status bits
const COEF_RDY: u8 = 1 << 7;
const SENSOR_RDY: u8 = 1 << 6;
const TMP_RDY: u8 = 1 << 5;
const PRS_RDY: u8 = 1 << 4;

/// MEAS_CFG mode: continuous pressure and temperature
const MODE_CONTINUOUS_BOTH: u8 = 0x07;

const SOFT_RESET: u8 = 0x09;

/// 1 measurement/s, 8x oversampling
const RATE_1_OVERSAMPLE_8: u8 = 0x03;

/// Compensation scale factor for 8x oversampling
const SCALE_8X: f32 = 7_864_320.0;

/// Polls of MEAS_CFG while waiting for calibration data after reset
const READY_POLLS: usize = 10;
const READY_POLL_MS: u32 = 10;

/// Factory calibration coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coefficients {
    pub c0: i32,
    pub c1: i32,
    pub c00: i32,
    pub c10: i32,
    pub c01: i32,
    pub c11: i32,
    pub c20: i32,
    pub c21: i32,
    pub c30: i32,
    pub c31: i32,
    pub c40: i32,
}

impl Coefficients {
    /// Unpack registers 0x10..=0x24
    pub fn from_registers(r: &[u8; COEF_LEN]) -> Self {
        let b = |i: usize| i32::from(r[i]);
        let be16 = |i: usize| i32::from(i16::from_be_bytes([r[i], r[i + 1]]));

        Self {
            c0: sign_extend((b(0) << 4) | (b(1) >> 4), 12),
            c1: sign_extend(((b(1) & 0x0F) << 8) | b(2), 12),
            c00: sign_extend((b(3) << 12) | (b(4) << 4) | (b(5) >> 4), 20),
            c10: sign_extend(((b(5) & 0x0F) << 16) | (b(6) << 8) | b(7), 20),
            c01: be16(8),
            c11: be16(10),
            c20: be16(12),
            c21: be16(14),
            c30: be16(16),
            c31: sign_extend((b(18) << 4) | (b(19) >> 4), 12),
            c40: sign_extend(((b(19) & 0x0F) << 8) | b(20), 12),
        }
    }

    /// Compensated temperature (°C) and pressure (hPa) from raw counts
    pub fn compensate(&self, raw_temp: i32, raw_pressure: i32) -> Ambient {
        let t = raw_temp as f32 / SCALE_8X;
        let p = raw_pressure as f32 / SCALE_8X;

        let temperature_c = self.c0 as f32 * 0.5 + self.c1 as f32 * t;
        let pascals = self.c00 as f32
            + p * (self.c10 as f32
                + p * (self.c20 as f32 + p * (self.c30 as f32 + p * self.c40 as f32)))
            + t * self.c01 as f32
            + t * p * (self.c11 as f32 + p * (self.c21 as f32 + p * self.c31 as f32));

        Ambient {
            temperature_c,
            pressure_hpa: pascals / 100.0,
        }
    }
}

/// Two's complement value of the low `bits` bits
fn sign_extend(value: i32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (value << shift) >> shift
}

pub struct Spa06<I2C> {
    i2c: I2C,
    address: u8,
    coefficients: Option<Coefficients>,
}

impl<I2C: I2c> Spa06<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            address: SPA06_ADDR,
            coefficients: None,
        }
    }

    /// Check the product id, reset, load calibration and start continuous
    /// measurement
    pub async fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), SensorError> {
        let id = self.read_reg(REG_ID).await?;
        if id != PRODUCT_ID {
            return Err(SensorError::UnknownDevice(id));
        }

        self.write_reg(REG_RESET, SOFT_RESET).await?;
        let mut ready = false;
        for _ in 0..READY_POLLS {
            delay.delay_ms(READY_POLL_MS).await;
            let status = self.read_reg(REG_MEAS_CFG).await?;
            if status & (COEF_RDY | SENSOR_RDY) == COEF_RDY | SENSOR_RDY {
                ready = true;
                break;
            }
        }
        if !ready {
            return Err(SensorError::NotReady);
        }

        let mut regs = [0u8; COEF_LEN];
        self.i2c
            .write_read(self.address, &[REG_COEF], &mut regs)
            .await
            .map_err(|_| SensorError::Bus)?;
        let coefficients = Coefficients::from_registers(&regs);
        debug!("SPA06 coefficients c0={} c1={}", coefficients.c0, coefficients.c1);

        self.write_reg(REG_PRS_CFG, RATE_1_OVERSAMPLE_8).await?;
        self.write_reg(REG_TMP_CFG, RATE_1_OVERSAMPLE_8).await?;
        // Result bit-shift is only needed above 8x oversampling
        self.write_reg(REG_CFG, 0x00).await?;
        self.write_reg(REG_MEAS_CFG, MODE_CONTINUOUS_BOTH).await?;

        self.coefficients = Some(coefficients);
        info!("SPA06-003 sensor initialized");
        Ok(())
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    async fn read_reg(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut value = [0u8];
        self.i2c
            .write_read(self.address, &[reg], &mut value)
            .await
            .map_err(|_| SensorError::Bus)?;
        Ok(value[0])
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[reg, value])
            .await
            .map_err(|_| SensorError::Bus)
    }
}

impl<I2C: I2c> EnvironmentSensor for Spa06<I2C> {
    async fn measure(&mut self) -> Result<Ambient, SensorError> {
        let coefficients = self.coefficients.ok_or(SensorError::NotReady)?;

        let status = self.read_reg(REG_MEAS_CFG).await?;
        if status & (TMP_RDY | PRS_RDY) != TMP_RDY | PRS_RDY {
            return Err(SensorError::NotReady);
        }

        // PSR_B2..B0 then TMP_B2..B0
        let mut raw = [0u8; 6];
        self.i2c
            .write_read(self.address, &[REG_PSR_B2], &mut raw)
            .await
            .map_err(|_| SensorError::Bus)?;
        let raw_pressure = sign_extend(i32::from_be_bytes([0, raw[0], raw[1], raw[2]]), 24);
        let raw_temp = sign_extend(i32::from_be_bytes([0, raw[3], raw[4], raw[5]]), 24);

        Ok(coefficients.compensate(raw_temp, raw_pressure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::tests::FakeI2c;
    use crate::timeout::tests::InstantDelay;
    use embassy_futures::block_on;

    /// c0 = 200, c1 = -256, c00 = 80000, c10 = -50000, rest zero
    const COEF_REGS: [u8; COEF_LEN] = [
        0x0C, 0x8F, 0x00, 0x13, 0x88, 0x0F, 0x3C, 0xB0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ];

    fn device() -> FakeI2c {
        let mut bus = FakeI2c::new(SPA06_ADDR);
        bus.regs[usize::from(REG_ID)] = PRODUCT_ID;
        bus.regs[usize::from(REG_MEAS_CFG)] = COEF_RDY | SENSOR_RDY;
        bus.regs[0x10..0x10 + COEF_LEN].copy_from_slice(&COEF_REGS);
        bus
    }

    #[test]
    fn test_coefficient_unpacking() {
        let c = Coefficients::from_registers(&COEF_REGS);
        assert_eq!(c.c0, 200);
        assert_eq!(c.c1, -256);
        assert_eq!(c.c00, 80_000);
        assert_eq!(c.c10, -50_000);
        assert_eq!(c.c40, 0);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x7FF, 12), 2047);
        assert_eq!(sign_extend(0x800, 12), -2048);
        assert_eq!(sign_extend(0xFFFFF, 20), -1);
        assert_eq!(sign_extend(0xC40000, 24), -3_932_160);
    }

    #[test]
    fn test_compensation() {
        let c = Coefficients::from_registers(&COEF_REGS);
        // scaled temperature 0.25, scaled pressure -0.5
        let ambient = c.compensate(1_966_080, -3_932_160);
        assert!((ambient.temperature_c - 36.0).abs() < 1e-4);
        assert!((ambient.pressure_hpa - 1050.0).abs() < 1e-2);
    }

    #[test]
    fn test_init_and_measure() {
        let mut sensor = Spa06::new(device());
        let mut delay = InstantDelay::default();
        block_on(sensor.init(&mut delay)).unwrap();

        let mut bus = sensor.release();
        assert!(bus.writes.contains(&(REG_RESET, SOFT_RESET)));
        assert!(bus.writes.contains(&(REG_MEAS_CFG, MODE_CONTINUOUS_BOTH)));

        bus.regs[usize::from(REG_MEAS_CFG)] = TMP_RDY | PRS_RDY | MODE_CONTINUOUS_BOTH;
        bus.regs[0..6].copy_from_slice(&[0xC4, 0x00, 0x00, 0x1E, 0x00, 0x00]);
        let mut sensor = Spa06 {
            i2c: bus,
            address: SPA06_ADDR,
            coefficients: Some(Coefficients::from_registers(&COEF_REGS)),
        };
        let ambient = block_on(sensor.measure()).unwrap();
        assert!((ambient.temperature_c - 36.0).abs() < 1e-4);
        assert!((ambient.pressure_hpa - 1050.0).abs() < 1e-2);
    }

    #[test]
    fn test_wrong_product_id() {
        let mut bus = device();
        bus.regs[usize::from(REG_ID)] = 0x58;
        let mut sensor = Spa06::new(bus);
        let mut delay = InstantDelay::default();
        assert_eq!(
            block_on(sensor.init(&mut delay)),
            Err(SensorError::UnknownDevice(0x58))
        );
    }

    #[test]
    fn test_measure_before_init() {
        let mut sensor = Spa06::new(device());
        assert_eq!(block_on(sensor.measure()), Err(SensorError::NotReady));
    }

    #[test]
    fn test_measure_data_not_ready() {
        let mut sensor = Spa06 {
            i2c: device(),
            address: SPA06_ADDR,
            coefficients: Some(Coefficients::default()),
        };
        assert_eq!(block_on(sensor.measure()), Err(SensorError::NotReady));
    }
}
