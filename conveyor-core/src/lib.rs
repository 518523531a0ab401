//! Board-agnostic core logic for the PCB conveyor controller
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (stepper, limit switch, transport motor, range sensor)
//! - Sensor fusion with presence debounce
//! - Width axis homing and positioning
//! - Transport motor speed validation and PWM mapping
//! - State machine and sequencer for load/unload/buffer operation
//! - Configuration type definitions

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod motion;
pub mod sensor;
pub mod sequencer;
pub mod state;
pub mod timer;
pub mod traits;
