//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod controller;
pub mod sensor;
pub mod serial_rx;
pub mod status_tx;

pub use controller::{controller_task, ConveyorSequencer, HandshakePins};
pub use sensor::{sensor_task, XshutPins};
pub use serial_rx::serial_rx_task;
pub use status_tx::status_tx_task;
