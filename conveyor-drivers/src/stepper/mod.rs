//! Stepper driver implementations

pub mod four_phase;

pub use four_phase::{FourPhaseConfig, FourPhaseStepper};
