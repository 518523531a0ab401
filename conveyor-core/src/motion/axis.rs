//! Width axis controller
//!
//! Owns the open-loop position model of the width axis. Position is only
//! known after homing: the axis steps toward the limit switch one step at a
//! time, backs off, and defines that point as the configured home offset.
//! From then on every move is validated against the bounds and converted to
//! a signed step count.

use libm::roundf;

use crate::config::AxisConfig;
use crate::traits::{LimitSwitch, StepperDriver, StepperError};

/// Axis position model
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisState {
    /// Position in mm; meaningless until `homed`
    pub current_position: f32,
    /// Whether homing has completed since power-up
    pub homed: bool,
}

/// Result of one homing poll
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingPoll {
    /// Still searching for the limit switch
    InProgress,
    /// Homed, axis at the given position
    Complete(f32),
}

/// Homing failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingError {
    /// Step budget exhausted without the switch asserting
    LimitNotFound,
    /// Stepper or switch I/O failed
    Driver(StepperError),
}

/// Move rejections and failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MoveError {
    /// Axis has not been homed
    NotHomed,
    /// Target above the maximum position
    AboveMaximum,
    /// Target below the minimum position
    BelowMinimum,
    /// Target is not a finite number
    InvalidTarget,
    /// Stepper I/O failed; position unchanged
    Driver(StepperError),
}

/// Description of a validated move
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MoveReport {
    /// Position before the move
    pub from: f32,
    /// Requested position
    pub to: f32,
    /// `to - from` in mm
    pub delta: f32,
    /// Signed steps issued
    pub steps: i32,
}

/// Width axis controller
pub struct AxisController<S, L> {
    config: AxisConfig,
    stepper: S,
    limit: L,
    state: AxisState,
    /// Steps taken so far while homing, `None` when not homing
    homing: Option<u32>,
}

impl<S: StepperDriver, L: LimitSwitch> AxisController<S, L> {
    /// Create an unhomed axis
    pub fn new(config: AxisConfig, stepper: S, limit: L) -> Self {
        Self {
            config,
            stepper,
            limit,
            state: AxisState {
                current_position: 0.0,
                homed: false,
            },
            homing: None,
        }
    }

    /// Current position model
    pub fn state(&self) -> AxisState {
        self.state
    }

    /// Current position in mm
    pub fn position(&self) -> f32 {
        self.state.current_position
    }

    /// Check if the axis has been homed
    pub fn is_homed(&self) -> bool {
        self.state.homed
    }

    /// Check if a homing routine is running
    pub fn is_homing(&self) -> bool {
        self.homing.is_some()
    }

    /// Axis configuration
    pub fn config(&self) -> &AxisConfig {
        &self.config
    }

    /// Access the stepper driver
    pub fn stepper(&self) -> &S {
        &self.stepper
    }

    /// Access the limit switch
    pub fn limit(&self) -> &L {
        &self.limit
    }

    /// Begin homing; the axis is unhomed until it completes
    pub fn start_homing(&mut self) {
        self.state.homed = false;
        self.homing = Some(0);
    }

    /// Advance homing by up to `homing_steps_per_poll` single steps
    ///
    /// Starts homing if it is not already running.
    pub fn poll_homing(&mut self) -> Result<HomingPoll, HomingError> {
        if self.homing.is_none() {
            self.start_homing();
        }
        let mut taken = self.homing.unwrap_or(0);
        let result = self.seek_limit(&mut taken);

        self.homing = match result {
            Ok(HomingPoll::InProgress) => Some(taken),
            _ => None,
        };
        result
    }

    fn seek_limit(&mut self, taken: &mut u32) -> Result<HomingPoll, HomingError> {
        for _ in 0..self.config.homing_steps_per_poll {
            if self.limit.is_triggered().map_err(HomingError::Driver)? {
                let backoff = -i32::from(self.config.limit_backoff_steps);
                self.stepper.step(backoff).map_err(HomingError::Driver)?;

                self.state = AxisState {
                    current_position: self.config.home_offset_mm,
                    homed: true,
                };
                return Ok(HomingPoll::Complete(self.state.current_position));
            }

            if *taken >= self.config.homing_max_steps {
                return Err(HomingError::LimitNotFound);
            }

            self.stepper.step(1).map_err(HomingError::Driver)?;
            *taken += 1;
        }

        Ok(HomingPoll::InProgress)
    }

    /// Run the complete homing routine
    pub fn home(&mut self) -> Result<f32, HomingError> {
        self.start_homing();
        loop {
            if let HomingPoll::Complete(position) = self.poll_homing()? {
                return Ok(position);
            }
        }
    }

    /// Validate a move without issuing it
    pub fn plan_move(&self, target_mm: f32) -> Result<MoveReport, MoveError> {
        if !self.state.homed {
            return Err(MoveError::NotHomed);
        }
        if !target_mm.is_finite() {
            return Err(MoveError::InvalidTarget);
        }
        if target_mm > self.config.max_position_mm {
            return Err(MoveError::AboveMaximum);
        }
        if target_mm < self.config.min_position_mm {
            return Err(MoveError::BelowMinimum);
        }

        let from = self.state.current_position;
        let delta = target_mm - from;
        let steps = roundf(delta * self.config.steps_per_mm) as i32;

        Ok(MoveReport {
            from,
            to: target_mm,
            delta,
            steps,
        })
    }

    /// Move to an absolute position
    ///
    /// The position model is only updated once the steps have been issued.
    pub fn move_to(&mut self, target_mm: f32) -> Result<MoveReport, MoveError> {
        let report = self.plan_move(target_mm)?;

        if report.steps != 0 {
            self.stepper.step(report.steps).map_err(MoveError::Driver)?;
        }
        self.state.current_position = target_mm;

        Ok(report)
    }
}
