//! Conveyor sequencer
//!
//! Converts commands, sensor snapshots and timer expirations into state
//! machine events and belt/axis actions.
//!
//! The sequencer is responsible for:
//! - Running G0/G28 against the width axis
//! - Running load, unload and buffer legs against the sensors
//! - Timing legs out and pacing the timed modes
//! - Queueing status events for the host

pub mod executor;
pub mod leg;

pub use executor::{ControlInputs, HandshakeOutputs, ReadySignals, Sequencer, STATUS_QUEUE_LEN};
pub use leg::{Leg, LegGoal, LegPhase, LegStatus};
