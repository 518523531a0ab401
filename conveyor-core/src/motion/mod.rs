//! Motion control
//!
//! - [`axis`]: width axis homing and absolute positioning
//! - [`transport`]: belt speed validation and PWM mapping

pub mod axis;
pub mod transport;

pub use axis::{AxisController, AxisState, HomingError, HomingPoll, MoveError, MoveReport};
pub use transport::{speed_to_duty, validate_speed, MotionDriver, MotionState};
