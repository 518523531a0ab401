//! State machine for conveyor operation
//!
//! Defines the authoritative operating mode of the conveyor.
//! The state machine is explicit, finite, and deterministic.

pub mod events;
pub mod machine;

pub use events::Event;
pub use machine::State;
