//! Transport motor trait
//!
//! The conveyor belt is driven by a DC motor through an H-bridge. The core
//! resolves speed and direction into a [`MotorOutput`]; implementations only
//! have to put it on the wire.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Belt direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Direction {
    /// Belt stopped
    #[default]
    Stop,
    /// Boards travel toward the left end
    Left,
    /// Boards travel toward the right end
    Right,
}

impl Direction {
    /// Get the opposite running direction (`Stop` stays `Stop`)
    pub fn opposite(self) -> Self {
        match self {
            Direction::Stop => Direction::Stop,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Errors that can occur with motor operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorError {
    /// PWM channel rejected the duty cycle
    Pwm,
    /// Direction or enable output failed
    Pin,
}

/// Resolved actuation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorOutput {
    /// Direction to drive; `Stop` whenever `duty` is zero
    pub direction: Direction,
    /// Duty in the configured PWM scale
    pub duty: u16,
}

impl MotorOutput {
    /// Motor off
    pub const STOPPED: Self = Self {
        direction: Direction::Stop,
        duty: 0,
    };

    /// Check if this output moves the belt
    pub fn is_running(&self) -> bool {
        self.direction != Direction::Stop && self.duty > 0
    }
}

/// Trait for the transport motor driver
pub trait TransportMotor {
    /// Apply a direction and duty
    ///
    /// `output.duty` is in the scale given by `SpeedConfig::pwm_full_scale`.
    fn drive(&mut self, output: MotorOutput) -> Result<(), MotorError>;
}
