//! Events that trigger state transitions

use conveyor_protocol::CommandKind;

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    // Axis events
    /// G28 accepted
    Home,
    /// Limit switch found and position defined
    HomingComplete,
    /// Limit switch not found or driver error
    HomingFailed,
    /// G0 passed validation and is being issued
    MoveAccepted,
    /// G0 steps issued (or failed)
    MoveFinished,

    // Transport commands
    /// M50
    LoadToMiddleNow,
    /// M51
    LoadToMiddle,
    /// M52
    LoadToEndNow,
    /// M53
    MoveToEnd,
    /// M54
    UnloadNow,
    /// M55
    Unload,
    /// M56
    UnloadTimed,
    /// M57
    Buffer,
    /// M58
    BufferTimed,
    /// M3/M4/M5 took over the belt
    ManualOverride,

    // Handshake events
    /// Upstream machine has a board for us
    UpstreamReady,
    /// Downstream machine can take a board
    DownstreamReady,

    // Sequencing events
    /// Board reached the leg's goal
    LegComplete,
    /// Leg ran out of time
    LegTimedOut,
    /// Timed-mode pause finished
    DwellElapsed,
    /// Buffered board released downstream
    ReleaseFinished,
}

impl Event {
    /// Event for a transport or homing command
    pub fn from_command(kind: CommandKind) -> Option<Self> {
        let event = match kind {
            CommandKind::Home => Event::Home,
            CommandKind::LoadToMiddleNow => Event::LoadToMiddleNow,
            CommandKind::LoadToMiddle => Event::LoadToMiddle,
            CommandKind::LoadToEndNow => Event::LoadToEndNow,
            CommandKind::MoveToEnd => Event::MoveToEnd,
            CommandKind::UnloadNow => Event::UnloadNow,
            CommandKind::Unload => Event::Unload,
            CommandKind::UnloadTimed => Event::UnloadTimed,
            CommandKind::Buffer => Event::Buffer,
            CommandKind::BufferTimed => Event::BufferTimed,
            _ => return None,
        };
        Some(event)
    }
}
