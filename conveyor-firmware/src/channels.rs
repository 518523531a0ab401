//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy tasks.
//! Only the controller task owns the sequencer; everything else talks to it
//! through these.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use conveyor_core::sensor::RawReadings;
use conveyor_protocol::{Command, StatusEvent};

/// Channel capacity for decoded commands
const COMMAND_CHANNEL_SIZE: usize = 8;

/// Channel capacity for outgoing status events
const STATUS_CHANNEL_SIZE: usize = 16;

/// Decoded commands from the serial link
pub static COMMAND_CHANNEL: Channel<CriticalSectionRawMutex, Command, COMMAND_CHANNEL_SIZE> =
    Channel::new();

/// Status events for the serial link
pub static STATUS_CHANNEL: Channel<CriticalSectionRawMutex, StatusEvent, STATUS_CHANNEL_SIZE> =
    Channel::new();

/// Latest range sample set (updated by sensor task)
pub static SENSOR_READINGS: Signal<CriticalSectionRawMutex, RawReadings> = Signal::new();
