//! Hardware driver implementations
//!
//! This crate provides `embedded-hal` 1.0 implementations of the traits
//! defined in conveyor-core:
//!
//! - Transport motor (dual PWM H-bridge)
//! - Width axis stepper (four-phase unipolar, wave/full step)
//! - Limit switch input
//! - VL53L0X time-of-flight board sensors

#![no_std]
#![deny(unsafe_code)]

pub mod motor;
pub mod sensor;
pub mod stepper;
