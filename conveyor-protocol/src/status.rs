//! Status events reported back to the host
//!
//! The sequencer queues these as it works; the firmware renders them with
//! `Display` and writes one per line to the serial console.

use core::fmt::{self, Write};

use heapless::String;

/// Maximum rendered status line length
pub const MAX_STATUS_LEN: usize = 96;

/// Something the operator should hear about
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusEvent {
    // Axis homing
    /// Homing routine started
    HomingStarted,
    /// Homing finished, axis now at `position` mm
    HomingComplete { position: f32 },
    /// Limit switch was never reached, or the driver failed
    HomingFailed,

    // Axis moves
    /// Move rejected because the axis has not been homed
    NotHomed,
    /// Move rejected: above the maximum position
    PositionTooLarge { max: f32 },
    /// Move rejected: below the minimum position
    PositionTooSmall { min: f32 },
    /// `G0` without a usable `Y`
    MissingPosition,
    /// Move accepted and issued
    MoveStarted {
        current: f32,
        requested: f32,
        delta: f32,
        steps: i32,
    },
    /// Move finished
    MoveComplete,
    /// Stepper driver reported an error during a move
    MoveFailed,

    // Conveyor
    /// Conveyor stopped
    ConveyorStop,
    /// Conveyor running left
    ConveyorLeft,
    /// Conveyor running right
    ConveyorRight,
    /// Requested speed outside the allowed range, coerced to zero
    SpeedRejected { requested: u16 },
    /// Transport sequence refused because the effective speed is zero
    NoSpeed,

    // Commands
    /// Command refused while homing
    Busy,
    /// Line did not contain a recognized command
    UnknownCommand,

    // Sequencing
    /// Operating mode changed
    StateChanged {
        from: &'static str,
        to: &'static str,
    },
    /// Board arrived at the middle position
    BoardAtMiddle,
    /// Board arrived at the exit sensor
    BoardAtEnd,
    /// Board left the conveyor
    BoardUnloaded,
    /// Load did not finish in time
    LoadTimeout { seconds: u16 },
    /// Unload did not finish in time
    UnloadTimeout { seconds: u16 },
    /// Waiting before the next timed release
    Dwelling { seconds: f32 },
    /// Transport motor driver reported an error
    MotorFault,
}

impl StatusEvent {
    /// Check if this event reports a refused command or a fault
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotHomed
                | Self::PositionTooLarge { .. }
                | Self::PositionTooSmall { .. }
                | Self::MissingPosition
                | Self::SpeedRejected { .. }
                | Self::NoSpeed
                | Self::Busy
                | Self::UnknownCommand
                | Self::HomingFailed
                | Self::MoveFailed
                | Self::MotorFault
        )
    }

    /// Check if this event reports a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::LoadTimeout { .. } | Self::UnloadTimeout { .. })
    }

    /// Render into a fixed-capacity line (truncated if too long)
    pub fn to_line(&self) -> String<MAX_STATUS_LEN> {
        let mut line = String::new();
        let _ = write!(line, "{}", self);
        line
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HomingStarted => f.write_str("Homing start"),
            Self::HomingComplete { position } => {
                write!(f, "Homing complete, position {:.2} mm", position)
            }
            Self::HomingFailed => f.write_str("Homing failed, limit switch not found"),
            Self::NotHomed => f.write_str("Home the device first using command 'G28'"),
            Self::PositionTooLarge { max } => {
                write!(f, "Can't move to greater than {} mm", max)
            }
            Self::PositionTooSmall { min } => write!(f, "Can't move to less than {} mm", min),
            Self::MissingPosition => f.write_str("No Y position given, staying in place"),
            Self::MoveStarted {
                current,
                requested,
                delta,
                steps,
            } => write!(
                f,
                "Current: {:.2}, Requested: {:.2}, Delta: {:.2}, Steps: {}",
                current, requested, delta, steps
            ),
            Self::MoveComplete => f.write_str("Move complete"),
            Self::MoveFailed => f.write_str("Move failed, stepper driver error"),
            Self::ConveyorStop => f.write_str("Conveyor stop"),
            Self::ConveyorLeft => f.write_str("Conveyor left"),
            Self::ConveyorRight => f.write_str("Conveyor right"),
            Self::SpeedRejected { requested } => {
                write!(f, "Speed {} out of range, conveyor stopped", requested)
            }
            Self::NoSpeed => f.write_str("No conveyor speed set, command ignored"),
            Self::Busy => f.write_str("Homing in progress, command ignored"),
            Self::UnknownCommand => f.write_str("Unknown or empty command ignored"),
            Self::StateChanged { from, to } => write!(f, "State: {} -> {}", from, to),
            Self::BoardAtMiddle => f.write_str("Board at middle"),
            Self::BoardAtEnd => f.write_str("Board at end"),
            Self::BoardUnloaded => f.write_str("Board unloaded"),
            Self::LoadTimeout { seconds } => {
                write!(f, "Load timed out after {} s", seconds)
            }
            Self::UnloadTimeout { seconds } => {
                write!(f, "Unload timed out after {} s", seconds)
            }
            Self::Dwelling { seconds } => write!(f, "Waiting {:.1} s", seconds),
            Self::MotorFault => f.write_str("Conveyor motor fault, stopped"),
        }
    }
}
