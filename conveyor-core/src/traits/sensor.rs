//! Board presence range sensor trait

use crate::sensor::RangeReading;

/// Errors from range sensor access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeSensorError {
    /// Bus transaction failed
    Bus,
    /// Device did not identify as the expected part
    WrongDevice,
}

/// Trait for time-of-flight distance sensors mounted above the belt
///
/// Measurements are single shot: [`start`](RangeSensor::start) triggers one,
/// [`poll`](RangeSensor::poll) returns it once ready.
pub trait RangeSensor {
    /// Trigger a measurement
    fn start(&mut self) -> Result<(), RangeSensorError>;

    /// Fetch the measurement if it has completed
    fn poll(&mut self) -> Result<Option<RangeReading>, RangeSensorError>;
}
