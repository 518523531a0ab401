//! Four-phase unipolar stepper on four GPIO outputs
//!
//! Drives a 28BYJ-48 style motor through a ULN2003 darlington array with the
//! classic four-step full-step sequence. Steps are issued blocking, one
//! phase change per step with a fixed delay derived from the configured
//! speed.

use conveyor_core::traits::{StepperDriver, StepperError};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// Coil pattern per phase, `IN1..IN4`
const PHASES: [[bool; 4]; 4] = [
    [true, false, true, false],
    [false, true, true, false],
    [false, true, false, true],
    [true, false, false, true],
];

/// Stepper configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FourPhaseConfig {
    /// Full steps per output shaft revolution
    pub steps_per_revolution: u16,
    /// Output shaft speed
    pub rpm: u16,
    /// Swap which direction counts as positive
    pub reversed: bool,
    /// De-energize the coils once a move finishes
    pub release_when_idle: bool,
}

impl Default for FourPhaseConfig {
    fn default() -> Self {
        Self {
            steps_per_revolution: 2048,
            rpm: 12,
            reversed: false,
            release_when_idle: true,
        }
    }
}

impl FourPhaseConfig {
    /// Delay between phase changes in microseconds
    pub fn step_delay_us(&self) -> u32 {
        let steps_per_minute = u32::from(self.steps_per_revolution) * u32::from(self.rpm);
        if steps_per_minute == 0 {
            return 0;
        }
        60_000_000 / steps_per_minute
    }
}

/// Four-phase stepper driver
pub struct FourPhaseStepper<P, D> {
    pins: [P; 4],
    delay: D,
    config: FourPhaseConfig,
    /// Index into `PHASES` of the last energized pattern
    phase: usize,
}

impl<P: OutputPin, D: DelayNs> FourPhaseStepper<P, D> {
    /// Create a driver with all coils off
    pub fn new(pins: [P; 4], delay: D, config: FourPhaseConfig) -> Self {
        Self {
            pins,
            delay,
            config,
            phase: 0,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &FourPhaseConfig {
        &self.config
    }

    /// De-energize all coils
    pub fn release(&mut self) -> Result<(), StepperError> {
        for pin in self.pins.iter_mut() {
            pin.set_low().map_err(|_| StepperError::OutputPin)?;
        }
        Ok(())
    }

    fn energize(&mut self, phase: usize) -> Result<(), StepperError> {
        for (pin, &on) in self.pins.iter_mut().zip(PHASES[phase].iter()) {
            let result = if on { pin.set_high() } else { pin.set_low() };
            result.map_err(|_| StepperError::OutputPin)?;
        }
        Ok(())
    }
}

impl<P: OutputPin, D: DelayNs> StepperDriver for FourPhaseStepper<P, D> {
    fn step(&mut self, steps: i32) -> Result<(), StepperError> {
        let forward = (steps > 0) != self.config.reversed;
        let delay_us = self.config.step_delay_us();

        for _ in 0..steps.unsigned_abs() {
            self.phase = if forward {
                (self.phase + 1) % PHASES.len()
            } else {
                (self.phase + PHASES.len() - 1) % PHASES.len()
            };
            self.energize(self.phase)?;
            self.delay.delay_us(delay_us);
        }

        if self.config.release_when_idle {
            self.release()?;
        }
        Ok(())
    }
}
