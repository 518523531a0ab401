//! Sensor implementations
//!
//! - Limit switch on a digital input
//! - VL53L0X range sensors over I2C

pub mod limit;
pub mod vl53l0x;

pub use limit::LimitInput;
pub use vl53l0x::{Vl53l0x, DEFAULT_ADDRESS};
