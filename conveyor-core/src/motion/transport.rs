//! Transport motor control
//!
//! Speed requests are validated before anything else happens: a request
//! outside `[min_speed, max_speed]` (other than zero) is coerced to zero,
//! never clamped.
//!
//! The accepted speed is mapped linearly onto the PWM duty range:
//!
//! ```text
//! duty = pwm_at_min + (speed - min_speed) * (pwm_at_max - pwm_at_min)
//!                                        / (max_speed - min_speed)
//! ```

use crate::config::SpeedConfig;
use crate::traits::{Direction, MotorError, MotorOutput, TransportMotor};

/// Requested belt motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionState {
    /// Requested direction
    pub direction: Direction,
    /// Zero or within `[min_speed, max_speed]`
    pub requested_speed: u16,
}

/// Validate a speed request against the configured range
pub fn validate_speed(config: &SpeedConfig, requested: u16) -> u16 {
    if requested == 0 || (config.min_speed..=config.max_speed).contains(&requested) {
        requested
    } else {
        0
    }
}

/// Map an accepted speed to a PWM duty
pub fn speed_to_duty(config: &SpeedConfig, speed: u16) -> u16 {
    if speed == 0 {
        return 0;
    }

    let in_span = u32::from(config.max_speed.saturating_sub(config.min_speed));
    let duty = if in_span == 0 {
        u32::from(config.pwm_at_max)
    } else {
        let offset = u32::from(speed.saturating_sub(config.min_speed));
        let out_span = u32::from(config.pwm_at_max.saturating_sub(config.pwm_at_min));
        u32::from(config.pwm_at_min) + offset * out_span / in_span
    };

    duty.max(u32::from(config.pwm_at_min))
        .min(u32::from(config.pwm_at_max))
        .min(u32::from(config.pwm_full_scale)) as u16
}

/// Transport motor state and output
pub struct MotionDriver<M> {
    config: SpeedConfig,
    motor: M,
    state: MotionState,
    /// Last output successfully pushed to the motor
    applied: Option<MotorOutput>,
}

impl<M: TransportMotor> MotionDriver<M> {
    /// Create a stopped driver
    pub fn new(config: SpeedConfig, motor: M) -> Self {
        Self {
            config,
            motor,
            state: MotionState::default(),
            applied: None,
        }
    }

    /// Current requested motion
    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Requested speed (zero when unset or rejected)
    pub fn requested_speed(&self) -> u16 {
        self.state.requested_speed
    }

    /// Requested direction
    pub fn direction(&self) -> Direction {
        self.state.direction
    }

    /// Speed configuration
    pub fn config(&self) -> &SpeedConfig {
        &self.config
    }

    /// Access the motor driver
    pub fn motor(&self) -> &M {
        &self.motor
    }

    /// Request a speed, returning the accepted value
    pub fn set_speed(&mut self, requested: u16) -> u16 {
        self.state.requested_speed = validate_speed(&self.config, requested);
        self.state.requested_speed
    }

    /// Request a direction
    pub fn set_direction(&mut self, direction: Direction) {
        self.state.direction = direction;
    }

    /// Stop the belt, keeping the requested speed for the next run
    pub fn stop(&mut self) {
        self.state.direction = Direction::Stop;
    }

    /// Output the motor should currently be driven with
    pub fn output(&self) -> MotorOutput {
        let duty = match self.state.direction {
            Direction::Stop => 0,
            _ => speed_to_duty(&self.config, self.state.requested_speed),
        };

        if duty == 0 {
            MotorOutput::STOPPED
        } else {
            MotorOutput {
                direction: self.state.direction,
                duty,
            }
        }
    }

    /// Check if the belt is being driven
    pub fn is_running(&self) -> bool {
        self.output().is_running()
    }

    /// Push the output to the motor if it changed since the last push
    ///
    /// Returns `Ok(true)` when the motor was updated. A failed push is
    /// retried on the next call.
    pub fn apply(&mut self) -> Result<bool, MotorError> {
        let output = self.output();
        if self.applied == Some(output) {
            return Ok(false);
        }

        self.motor.drive(output)?;
        self.applied = Some(output);
        Ok(true)
    }
}
