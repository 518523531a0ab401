//! Sensor fusion with presence debounce
//!
//! A present sample trips a sensor immediately. Clearing it takes
//! `debounce_count` consecutive absent samples, which rides out gaps between
//! components and holes in the board.

use crate::config::{FlowDirection, SensorConfig};

use super::{RangeReading, RawReadings};

/// Debounced presence, mapped onto the flow of boards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSnapshot {
    /// Board at the entrance sensor
    pub entrance_present: bool,
    /// Board at the middle (parking) sensor
    pub middle_present: bool,
    /// Board at the exit sensor
    pub exit_present: bool,
}

impl SensorSnapshot {
    /// Check if a board is somewhere on the belt past the entrance
    pub fn board_on_belt(&self) -> bool {
        self.middle_present || self.exit_present
    }
}

/// Changes between two consecutive snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorEdges {
    pub entrance_arrived: bool,
    pub entrance_cleared: bool,
    pub middle_arrived: bool,
    pub middle_cleared: bool,
    pub exit_arrived: bool,
    pub exit_cleared: bool,
}

impl SensorEdges {
    /// Compare two snapshots
    pub fn between(prev: &SensorSnapshot, next: &SensorSnapshot) -> Self {
        Self {
            entrance_arrived: !prev.entrance_present && next.entrance_present,
            entrance_cleared: prev.entrance_present && !next.entrance_present,
            middle_arrived: !prev.middle_present && next.middle_present,
            middle_cleared: prev.middle_present && !next.middle_present,
            exit_arrived: !prev.exit_present && next.exit_present,
            exit_cleared: prev.exit_present && !next.exit_present,
        }
    }

    /// Check if nothing changed
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Debounce state for one sensor
#[derive(Debug, Clone, Copy, Default)]
struct Debounced {
    present: bool,
    absent_count: u8,
}

impl Debounced {
    fn update(&mut self, sample_present: bool, debounce_count: u8) -> bool {
        if sample_present {
            self.present = true;
            self.absent_count = 0;
        } else if self.present {
            self.absent_count = self.absent_count.saturating_add(1);
            if self.absent_count >= debounce_count {
                self.present = false;
                self.absent_count = 0;
            }
        }
        self.present
    }
}

/// Turns raw range samples into debounced entrance/middle/exit presence
#[derive(Debug, Clone)]
pub struct SensorFusion {
    config: SensorConfig,
    flow: FlowDirection,
    left: Debounced,
    middle: Debounced,
    right: Debounced,
    snapshot: SensorSnapshot,
    edges: SensorEdges,
}

impl SensorFusion {
    /// Create with all sensors clear
    pub fn new(config: SensorConfig, flow: FlowDirection) -> Self {
        Self {
            config,
            flow,
            left: Debounced::default(),
            middle: Debounced::default(),
            right: Debounced::default(),
            snapshot: SensorSnapshot::default(),
            edges: SensorEdges::default(),
        }
    }

    /// Feed one sample from each sensor
    pub fn update(&mut self, raw: &RawReadings) -> SensorSnapshot {
        let threshold = self.config.trigger_height_mm;
        let count = self.config.debounce_count;
        let sample = |reading: RangeReading| reading.is_present(threshold);

        let left = self.left.update(sample(raw.left), count);
        let middle = self.middle.update(sample(raw.middle), count);
        let right = self.right.update(sample(raw.right), count);

        let (entrance_present, exit_present) = match self.flow {
            FlowDirection::LeftToRight => (left, right),
            FlowDirection::RightToLeft => (right, left),
        };

        let next = SensorSnapshot {
            entrance_present,
            middle_present: middle,
            exit_present,
        };
        self.edges = SensorEdges::between(&self.snapshot, &next);
        self.snapshot = next;
        next
    }

    /// Most recent snapshot
    pub fn snapshot(&self) -> SensorSnapshot {
        self.snapshot
    }

    /// Edges produced by the most recent update
    pub fn edges(&self) -> SensorEdges {
        self.edges
    }

    /// Forget all history
    pub fn reset(&mut self) {
        self.left = Debounced::default();
        self.middle = Debounced::default();
        self.right = Debounced::default();
        self.snapshot = SensorSnapshot::default();
        self.edges = SensorEdges::default();
    }
}
