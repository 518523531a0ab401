//! Width axis stepper and limit switch traits
//!
//! The axis is driven open loop: the controller counts the steps it has
//! requested and only learns its absolute position from the limit switch
//! during homing.

/// Errors that can occur with stepper or limit switch operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepperError {
    /// Failed to drive a coil output
    OutputPin,
    /// Failed to read the limit switch input
    LimitInput,
}

/// Trait for stepper motor drivers
///
/// Positive step counts move the axis toward the limit switch (increasing
/// position), negative counts move away from it.
pub trait StepperDriver {
    /// Move a signed number of steps, returning once they have been issued
    fn step(&mut self, steps: i32) -> Result<(), StepperError>;
}

/// Trait for the homing limit switch
pub trait LimitSwitch {
    /// Check if the switch is currently asserted
    fn is_triggered(&mut self) -> Result<bool, StepperError>;
}
