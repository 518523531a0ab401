//! Configuration type definitions
//!
//! These types represent the conveyor configuration. Defaults match the
//! reference machine: a 28BYJ-48 width axis at 39.47 steps/mm, a belt motor
//! on a 10-bit PWM and VL53L0X presence sensors 45 mm above the belt.

use conveyor_protocol::CanCommandFilter;

use crate::traits::Direction;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum serialized config size in bytes
pub const MAX_CONFIG_SIZE: usize = 256;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `steps_per_mm` must be positive
    InvalidStepsPerMm,
    /// Axis minimum must be below maximum
    InvalidAxisBounds,
    /// Home offset must lie inside the axis bounds
    HomeOutsideBounds,
    /// Homing step budget must be non-zero
    InvalidHoming,
    /// Speed range empty or zero
    InvalidSpeedRange,
    /// Default speed outside the speed range
    InvalidDefaultSpeed,
    /// PWM endpoints out of order or above full scale
    InvalidPwmRange,
    /// Debounce count must be at least one sample
    InvalidDebounce,
    /// Timeouts must be non-zero
    InvalidTimeout,
    /// Default pause must be a non-negative number
    InvalidPause,
    /// Serialized data could not be decoded
    Decode,
    /// Output buffer too small for encoding
    BufferTooSmall,
}

/// Order in which boards pass the physical sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FlowDirection {
    /// Boards enter at the left sensor and leave past the right sensor
    #[default]
    LeftToRight,
    /// Boards enter at the right sensor and leave past the left sensor
    RightToLeft,
}

impl FlowDirection {
    /// Belt direction that carries boards from entrance to exit
    pub fn forward(self) -> Direction {
        match self {
            FlowDirection::LeftToRight => Direction::Right,
            FlowDirection::RightToLeft => Direction::Left,
        }
    }
}

/// Width axis configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AxisConfig {
    /// Steps per millimeter of travel
    pub steps_per_mm: f32,
    /// Minimum allowed position in mm
    pub min_position_mm: f32,
    /// Maximum allowed position in mm
    pub max_position_mm: f32,
    /// Position assigned after homing and backing off the switch
    pub home_offset_mm: f32,
    /// Steps to reverse after the limit switch asserts
    pub limit_backoff_steps: u16,
    /// Single steps taken per control tick while homing
    pub homing_steps_per_poll: u16,
    /// Give up homing after this many steps without reaching the switch
    pub homing_max_steps: u32,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            steps_per_mm: 39.47,
            min_position_mm: 45.0,
            max_position_mm: 300.0,
            home_offset_mm: 297.0,
            limit_backoff_steps: 100,
            homing_steps_per_poll: 64,
            homing_max_steps: 13_000,
        }
    }
}

/// Transport motor speed configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpeedConfig {
    /// Lowest accepted non-zero speed
    pub min_speed: u16,
    /// Highest accepted speed
    pub max_speed: u16,
    /// Speed used by transport commands when none has been set
    pub default_speed: u16,
    /// Duty at `min_speed`
    pub pwm_at_min: u16,
    /// Duty at `max_speed`
    pub pwm_at_max: u16,
    /// Duty value meaning 100%
    pub pwm_full_scale: u16,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            min_speed: 600,
            max_speed: 2200,
            default_speed: 1200,
            pwm_at_min: 200,
            pwm_at_max: 1023,
            pwm_full_scale: 1023,
        }
    }
}

/// Presence sensor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SensorConfig {
    /// A distance below this (mm) means a board is under the sensor
    pub trigger_height_mm: u16,
    /// Consecutive absent samples needed before a present signal clears
    pub debounce_count: u8,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            trigger_height_mm: 45,
            debounce_count: 10,
        }
    }
}

/// Sequencing time limits
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimingConfig {
    /// Give up a load after this many seconds
    pub load_timeout_s: u16,
    /// Give up an unload after this many seconds
    pub unload_timeout_s: u16,
    /// Keep the belt running this long after a board clears the exit sensor
    pub runon_ms: u32,
    /// Pause for timed modes when no `P` has been given
    pub default_pause_s: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            load_timeout_s: 30,
            unload_timeout_s: 30,
            runon_ms: 0,
            default_pause_s: 5.0,
        }
    }
}

impl TimingConfig {
    /// Load timeout in milliseconds
    pub fn load_timeout_ms(&self) -> u32 {
        u32::from(self.load_timeout_s) * 1000
    }

    /// Unload timeout in milliseconds
    pub fn unload_timeout_ms(&self) -> u32 {
        u32::from(self.unload_timeout_s) * 1000
    }
}

/// Board flow and command transport configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransportConfig {
    /// Sensor order along the belt
    pub flow: FlowDirection,
    /// Drop CAN frames from `can_excluded_source`
    pub can_filter_enabled: bool,
    /// J1939 source address to ignore
    pub can_excluded_source: u8,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            flow: FlowDirection::LeftToRight,
            can_filter_enabled: true,
            can_excluded_source: 0x80,
        }
    }
}

impl TransportConfig {
    /// Build the CAN command filter
    pub fn can_filter(&self) -> CanCommandFilter {
        if self.can_filter_enabled {
            CanCommandFilter::excluding(self.can_excluded_source)
        } else {
            CanCommandFilter::accept_all()
        }
    }
}

/// Complete conveyor configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConveyorConfig {
    pub axis: AxisConfig,
    pub speed: SpeedConfig,
    pub sensors: SensorConfig,
    pub timing: TimingConfig,
    pub transport: TransportConfig,
}

impl ConveyorConfig {
    /// Check the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let axis = &self.axis;
        if !(axis.steps_per_mm.is_finite() && axis.steps_per_mm > 0.0) {
            return Err(ConfigError::InvalidStepsPerMm);
        }
        if !(axis.min_position_mm.is_finite()
            && axis.max_position_mm.is_finite()
            && axis.min_position_mm < axis.max_position_mm)
        {
            return Err(ConfigError::InvalidAxisBounds);
        }
        if !(axis.min_position_mm..=axis.max_position_mm).contains(&axis.home_offset_mm) {
            return Err(ConfigError::HomeOutsideBounds);
        }
        if axis.homing_steps_per_poll == 0 || axis.homing_max_steps == 0 {
            return Err(ConfigError::InvalidHoming);
        }

        let speed = &self.speed;
        if speed.min_speed == 0 || speed.min_speed > speed.max_speed {
            return Err(ConfigError::InvalidSpeedRange);
        }
        if !(speed.min_speed..=speed.max_speed).contains(&speed.default_speed) {
            return Err(ConfigError::InvalidDefaultSpeed);
        }
        if speed.pwm_full_scale == 0
            || speed.pwm_at_min > speed.pwm_at_max
            || speed.pwm_at_max > speed.pwm_full_scale
        {
            return Err(ConfigError::InvalidPwmRange);
        }

        if self.sensors.debounce_count == 0 {
            return Err(ConfigError::InvalidDebounce);
        }

        let timing = &self.timing;
        if timing.load_timeout_s == 0 || timing.unload_timeout_s == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if !(timing.default_pause_s.is_finite() && timing.default_pause_s >= 0.0) {
            return Err(ConfigError::InvalidPause);
        }

        Ok(())
    }

    /// Decode and validate a postcard-serialized configuration
    #[cfg(feature = "serde")]
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize with postcard into `buf`, returning the used prefix
    #[cfg(feature = "serde")]
    pub fn to_postcard<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::BufferTooSmall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(ConveyorConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_reference_machine_defaults() {
        let config = ConveyorConfig::default();
        assert_eq!(config.axis.limit_backoff_steps, 100);
        assert_eq!(config.axis.home_offset_mm, 297.0);
        assert_eq!(config.speed.min_speed, 600);
        assert_eq!(config.speed.max_speed, 2200);
        assert_eq!(config.timing.load_timeout_ms(), 30_000);
        assert_eq!(config.sensors.debounce_count, 10);
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let mut config = ConveyorConfig::default();
        config.axis.min_position_mm = 310.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidAxisBounds));
    }

    #[test]
    fn test_rejects_home_outside_bounds() {
        let mut config = ConveyorConfig::default();
        config.axis.home_offset_mm = 320.0;
        assert_eq!(config.validate(), Err(ConfigError::HomeOutsideBounds));
    }

    #[test]
    fn test_rejects_default_speed_out_of_range() {
        let mut config = ConveyorConfig::default();
        config.speed.default_speed = 100;
        assert_eq!(config.validate(), Err(ConfigError::InvalidDefaultSpeed));
    }

    #[test]
    fn test_rejects_pwm_above_full_scale() {
        let mut config = ConveyorConfig::default();
        config.speed.pwm_at_max = 2000;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPwmRange));
    }

    #[test]
    fn test_rejects_zero_debounce() {
        let mut config = ConveyorConfig::default();
        config.sensors.debounce_count = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidDebounce));
    }

    #[test]
    fn test_flow_direction_forward() {
        assert_eq!(FlowDirection::LeftToRight.forward(), Direction::Right);
        assert_eq!(FlowDirection::RightToLeft.forward(), Direction::Left);
    }

    #[test]
    fn test_can_filter_from_config() {
        let mut transport = TransportConfig::default();
        assert_eq!(transport.can_filter(), CanCommandFilter::excluding(0x80));

        transport.can_filter_enabled = false;
        assert_eq!(transport.can_filter(), CanCommandFilter::accept_all());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_postcard_blob() {
        let mut config = ConveyorConfig::default();
        config.transport.flow = FlowDirection::RightToLeft;
        config.timing.runon_ms = 250;

        let mut buf = [0u8; MAX_CONFIG_SIZE];
        let used = config.to_postcard(&mut buf).unwrap().len();
        assert_eq!(ConveyorConfig::from_postcard(&buf[..used]), Ok(config));
    }
}
