//! Board presence sensing
//!
//! Three range sensors look down at the belt. A board passing underneath
//! shortens the measured distance below the trigger height.

pub mod fusion;

pub use fusion::{SensorEdges, SensorFusion, SensorSnapshot};

/// One raw range sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeReading {
    /// Measured distance in mm
    Distance(u16),
    /// Nothing within range, or the sensor could not be read
    #[default]
    OutOfRange,
}

impl RangeReading {
    /// Check if this sample indicates a board under the sensor
    pub fn is_present(self, trigger_height_mm: u16) -> bool {
        matches!(self, RangeReading::Distance(mm) if mm < trigger_height_mm)
    }
}

/// One sample from each sensor, by physical position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawReadings {
    pub left: RangeReading,
    pub middle: RangeReading,
    pub right: RangeReading,
}
