//! Hardware abstraction traits
//!
//! These traits define the interface between the application logic
//! and hardware-specific implementations.

pub mod motor;
pub mod sensor;
pub mod stepper;

pub use motor::{Direction, MotorError, MotorOutput, TransportMotor};
pub use sensor::{RangeSensor, RangeSensorError};
pub use stepper::{LimitSwitch, StepperDriver, StepperError};
