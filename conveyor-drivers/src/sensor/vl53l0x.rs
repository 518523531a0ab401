//! VL53L0X time-of-flight range sensor
//!
//! Single-shot ranging over blocking I2C. Every sensor powers up at
//! [`DEFAULT_ADDRESS`], so boards with several sensors hold all but one in
//! reset (XSHUT low), move the awake one to a new address with
//! [`Vl53l0x::set_address`], and repeat.
//!
//! Register map used:
//!
//! | Register | Name                          |
//! |----------|-------------------------------|
//! | `0x00`   | `SYSRANGE_START`              |
//! | `0x0B`   | `SYSTEM_INTERRUPT_CLEAR`      |
//! | `0x13`   | `RESULT_INTERRUPT_STATUS`     |
//! | `0x1E`   | `RESULT_RANGE_STATUS` + 10    |
//! | `0x89`   | `VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV` |
//! | `0x8A`   | `I2C_SLAVE_DEVICE_ADDRESS`    |
//! | `0xC0`   | `IDENTIFICATION_MODEL_ID`     |

use conveyor_core::sensor::RangeReading;
use conveyor_core::traits::{RangeSensor, RangeSensorError};
use embedded_hal::i2c::I2c;

/// Address every sensor has after reset
pub const DEFAULT_ADDRESS: u8 = 0x29;

/// Expected contents of `IDENTIFICATION_MODEL_ID`
const MODEL_ID: u8 = 0xEE;

/// Ranges at or above this are reported by the part when nothing is seen
const OUT_OF_RANGE_MM: u16 = 8190;

mod reg {
    pub const SYSRANGE_START: u8 = 0x00;
    pub const SYSTEM_INTERRUPT_CLEAR: u8 = 0x0B;
    pub const RESULT_INTERRUPT_STATUS: u8 = 0x13;
    pub const RESULT_RANGE_MM: u8 = 0x1E;
    pub const I2C_STANDARD_MODE: u8 = 0x88;
    pub const VHV_CONFIG_PAD: u8 = 0x89;
    pub const I2C_SLAVE_DEVICE_ADDRESS: u8 = 0x8A;
    pub const IDENTIFICATION_MODEL_ID: u8 = 0xC0;
    pub const POWER_MANAGEMENT: u8 = 0x80;
    pub const PAGE_SELECT: u8 = 0xFF;
    pub const STOP_VARIABLE: u8 = 0x91;
}

/// VL53L0X driver
pub struct Vl53l0x<I2C> {
    i2c: I2C,
    address: u8,
    /// Read from the part during init, replayed before every measurement
    stop_variable: u8,
    measuring: bool,
}

impl<I2C: I2c> Vl53l0x<I2C> {
    /// Driver for a sensor at the reset address
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    /// Driver for a sensor that has already been readdressed
    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            stop_variable: 0,
            measuring: false,
        }
    }

    /// Current 7-bit bus address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Check the model ID register
    pub fn verify(&mut self) -> Result<(), RangeSensorError> {
        if self.read_u8(reg::IDENTIFICATION_MODEL_ID)? == MODEL_ID {
            Ok(())
        } else {
            Err(RangeSensorError::WrongDevice)
        }
    }

    /// Verify the part and prepare it for single-shot ranging
    // TODO: load the reference SPAD map and default tuning table for full
    // accuracy; presence detection at 45 mm works with the reset defaults
    pub fn init(&mut self) -> Result<(), RangeSensorError> {
        self.verify()?;

        // 2V8 I/O mode
        let pad = self.read_u8(reg::VHV_CONFIG_PAD)?;
        self.write_u8(reg::VHV_CONFIG_PAD, pad | 0x01)?;

        self.write_u8(reg::I2C_STANDARD_MODE, 0x00)?;
        self.write_u8(reg::POWER_MANAGEMENT, 0x01)?;
        self.write_u8(reg::PAGE_SELECT, 0x01)?;
        self.write_u8(reg::SYSRANGE_START, 0x00)?;
        self.stop_variable = self.read_u8(reg::STOP_VARIABLE)?;
        self.write_u8(reg::SYSRANGE_START, 0x01)?;
        self.write_u8(reg::PAGE_SELECT, 0x00)?;
        self.write_u8(reg::POWER_MANAGEMENT, 0x00)?;

        self.measuring = false;
        Ok(())
    }

    /// Move the sensor to a new 7-bit address
    ///
    /// Only the sensor currently out of reset may be on the bus at the old
    /// address when this is called.
    pub fn set_address(&mut self, address: u8) -> Result<(), RangeSensorError> {
        let address = address & 0x7F;
        self.write_u8(reg::I2C_SLAVE_DEVICE_ADDRESS, address)?;
        self.address = address;
        Ok(())
    }

    /// Give back the bus
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_u8(&mut self, register: u8) -> Result<u8, RangeSensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|_| RangeSensorError::Bus)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self, register: u8) -> Result<u16, RangeSensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|_| RangeSensorError::Bus)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn write_u8(&mut self, register: u8, value: u8) -> Result<(), RangeSensorError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|_| RangeSensorError::Bus)
    }
}

impl<I2C: I2c> RangeSensor for Vl53l0x<I2C> {
    fn start(&mut self) -> Result<(), RangeSensorError> {
        self.write_u8(reg::POWER_MANAGEMENT, 0x01)?;
        self.write_u8(reg::PAGE_SELECT, 0x01)?;
        self.write_u8(reg::SYSRANGE_START, 0x00)?;
        self.write_u8(reg::STOP_VARIABLE, self.stop_variable)?;
        self.write_u8(reg::SYSRANGE_START, 0x01)?;
        self.write_u8(reg::PAGE_SELECT, 0x00)?;
        self.write_u8(reg::POWER_MANAGEMENT, 0x00)?;

        self.write_u8(reg::SYSRANGE_START, 0x01)?;
        self.measuring = true;
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<RangeReading>, RangeSensorError> {
        if !self.measuring {
            return Ok(None);
        }
        if self.read_u8(reg::RESULT_INTERRUPT_STATUS)? & 0x07 == 0 {
            return Ok(None);
        }

        let mm = self.read_u16(reg::RESULT_RANGE_MM)?;
        self.write_u8(reg::SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        self.measuring = false;

        Ok(Some(if mm >= OUT_OF_RANGE_MM {
            RangeReading::OutOfRange
        } else {
            RangeReading::Distance(mm)
        }))
    }
}
