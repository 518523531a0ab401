//! State machine definition
//!
//! All belt and axis behavior is a function of the current state and an
//! event. Sequences end in the rest state: `Idle` once the axis has been
//! homed, `Unhomed` before.

use super::events::Event;

/// Conveyor operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Power-on state, axis position unknown
    Unhomed,
    /// Homed and waiting for a command
    Idle,
    /// Searching for the axis limit switch
    Homing,
    /// Width axis move in progress
    Moving,
    /// M50: belt running until a board reaches the middle
    LoadingToMiddle,
    /// M52: belt running until a board reaches the exit sensor
    LoadingToEnd,
    /// M53: belt running until the board on it reaches the exit sensor
    MovingToEnd,
    /// M51: waiting for upstream to offer a board
    WaitingToLoad,
    /// M55: waiting for downstream to accept a board
    WaitingToUnload,
    /// M54: belt running until the board has left past the exit
    UnloadingNow,
    /// M56: repeated unloads separated by a pause
    UnloadingTimed { dwelling: bool },
    /// M57: hold one board, release it when downstream is ready
    Buffering,
    /// M58: hold one board, release one per pause
    BufferingTimed { dwelling: bool },
}

impl State {
    /// Short snake_case name for status reporting
    pub fn name(&self) -> &'static str {
        match self {
            State::Unhomed => "unhomed",
            State::Idle => "idle",
            State::Homing => "homing",
            State::Moving => "moving",
            State::LoadingToMiddle => "loading_to_middle",
            State::LoadingToEnd => "loading_to_end",
            State::MovingToEnd => "moving_to_end",
            State::WaitingToLoad => "waiting_to_load",
            State::WaitingToUnload => "waiting_to_unload",
            State::UnloadingNow => "unloading",
            State::UnloadingTimed { dwelling: false } => "unloading_timed",
            State::UnloadingTimed { dwelling: true } => "unloading_timed_dwell",
            State::Buffering => "buffering",
            State::BufferingTimed { dwelling: false } => "buffering_timed",
            State::BufferingTimed { dwelling: true } => "buffering_timed_dwell",
        }
    }

    /// Check if this state belongs to a board transport sequence
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            State::LoadingToMiddle
                | State::LoadingToEnd
                | State::MovingToEnd
                | State::WaitingToLoad
                | State::WaitingToUnload
                | State::UnloadingNow
                | State::UnloadingTimed { .. }
                | State::Buffering
                | State::BufferingTimed { .. }
        )
    }

    /// Check if this is one of the buffer modes
    pub fn is_buffering(&self) -> bool {
        matches!(self, State::Buffering | State::BufferingTimed { .. })
    }

    /// Process an event and return the next state
    ///
    /// `homed` selects the rest state sequences return to.
    pub fn transition(self, event: Event, homed: bool) -> Self {
        use Event::*;
        use State::*;

        let rest = if homed { Idle } else { Unhomed };

        match (self, event) {
            // Homing runs to completion
            (Homing, HomingComplete) => Idle,
            (Homing, HomingFailed) => Unhomed,
            (Homing, _) => Homing,

            (_, Home) => Homing,

            // Axis moves
            (Moving, MoveFinished) => rest,
            (Moving, _) => Moving,
            (_, MoveAccepted) if homed => Moving,

            // Transport commands supersede whatever is running
            (_, LoadToMiddleNow) => LoadingToMiddle,
            (_, LoadToMiddle) => WaitingToLoad,
            (_, LoadToEndNow) => LoadingToEnd,
            (_, MoveToEnd) => MovingToEnd,
            (_, UnloadNow) => UnloadingNow,
            (_, Unload) => WaitingToUnload,
            (_, UnloadTimed) => UnloadingTimed { dwelling: false },
            (_, Buffer) => Buffering,
            (_, BufferTimed) => BufferingTimed { dwelling: true },

            // Handshakes
            (WaitingToLoad, UpstreamReady) => LoadingToMiddle,
            (WaitingToUnload, DownstreamReady) => UnloadingNow,

            // Single legs return to rest whether or not the board arrived
            (LoadingToMiddle | LoadingToEnd | MovingToEnd | UnloadingNow, LegComplete | LegTimedOut) => {
                rest
            }

            // Timed unload alternates unloading and dwelling
            (UnloadingTimed { dwelling: false }, LegComplete | LegTimedOut) => {
                UnloadingTimed { dwelling: true }
            }
            (UnloadingTimed { dwelling: true }, DwellElapsed) => UnloadingTimed { dwelling: false },

            // Timed buffer releases one board per dwell
            (BufferingTimed { dwelling: true }, DwellElapsed) => BufferingTimed { dwelling: false },
            (BufferingTimed { dwelling: false }, ReleaseFinished) => {
                BufferingTimed { dwelling: true }
            }

            // Direct belt control cancels any sequence
            (state, ManualOverride) if state.is_transport() => rest,

            // Default: stay in current state
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_from_unhomed() {
        let next = State::Unhomed.transition(Event::Home, false);
        assert_eq!(next, State::Homing);
        assert_eq!(next.transition(Event::HomingComplete, true), State::Idle);
    }

    #[test]
    fn test_homing_failure_returns_to_unhomed() {
        assert_eq!(
            State::Homing.transition(Event::HomingFailed, false),
            State::Unhomed
        );
    }

    #[test]
    fn test_homing_ignores_other_events() {
        let events = [
            Event::LoadToMiddleNow,
            Event::ManualOverride,
            Event::MoveAccepted,
            Event::LegComplete,
            Event::Home,
        ];

        for event in events {
            assert_eq!(State::Homing.transition(event, false), State::Homing);
        }
    }

    #[test]
    fn test_move_requires_homing() {
        assert_eq!(
            State::Unhomed.transition(Event::MoveAccepted, false),
            State::Unhomed
        );
        assert_eq!(State::Idle.transition(Event::MoveAccepted, true), State::Moving);
        assert_eq!(State::Moving.transition(Event::MoveFinished, true), State::Idle);
    }

    #[test]
    fn test_transport_commands_from_any_state() {
        let states = [
            State::Unhomed,
            State::Idle,
            State::Buffering,
            State::UnloadingTimed { dwelling: true },
        ];

        for state in states {
            assert_eq!(
                state.transition(Event::LoadToMiddleNow, true),
                State::LoadingToMiddle
            );
            assert_eq!(
                state.transition(Event::BufferTimed, true),
                State::BufferingTimed { dwelling: true }
            );
        }
    }

    #[test]
    fn test_leg_end_returns_to_rest() {
        for state in [
            State::LoadingToMiddle,
            State::LoadingToEnd,
            State::MovingToEnd,
            State::UnloadingNow,
        ] {
            assert_eq!(state.transition(Event::LegComplete, true), State::Idle);
            assert_eq!(state.transition(Event::LegTimedOut, false), State::Unhomed);
        }
    }

    #[test]
    fn test_handshake_waits() {
        let waiting = State::Idle.transition(Event::LoadToMiddle, true);
        assert_eq!(waiting, State::WaitingToLoad);
        assert_eq!(waiting.transition(Event::LegComplete, true), waiting);
        assert_eq!(
            waiting.transition(Event::UpstreamReady, true),
            State::LoadingToMiddle
        );

        let waiting = State::Idle.transition(Event::Unload, true);
        assert_eq!(
            waiting.transition(Event::DownstreamReady, true),
            State::UnloadingNow
        );
    }

    #[test]
    fn test_timed_unload_cycle() {
        let unloading = State::Idle.transition(Event::UnloadTimed, true);
        assert_eq!(unloading, State::UnloadingTimed { dwelling: false });

        let dwelling = unloading.transition(Event::LegTimedOut, true);
        assert_eq!(dwelling, State::UnloadingTimed { dwelling: true });

        assert_eq!(dwelling.transition(Event::DwellElapsed, true), unloading);
    }

    #[test]
    fn test_timed_buffer_cycle() {
        let dwelling = State::Idle.transition(Event::BufferTimed, true);
        assert_eq!(dwelling, State::BufferingTimed { dwelling: true });

        let releasing = dwelling.transition(Event::DwellElapsed, true);
        assert_eq!(releasing, State::BufferingTimed { dwelling: false });

        // Loads finishing in between do not end the release
        assert_eq!(releasing.transition(Event::LegComplete, true), releasing);
        assert_eq!(releasing.transition(Event::ReleaseFinished, true), dwelling);
    }

    #[test]
    fn test_manual_override() {
        assert_eq!(
            State::Buffering.transition(Event::ManualOverride, true),
            State::Idle
        );
        assert_eq!(
            State::UnloadingNow.transition(Event::ManualOverride, false),
            State::Unhomed
        );
        assert_eq!(
            State::Idle.transition(Event::ManualOverride, true),
            State::Idle
        );
    }

    #[test]
    fn test_names_are_distinct() {
        let states = [
            State::Unhomed,
            State::Idle,
            State::Homing,
            State::Moving,
            State::LoadingToMiddle,
            State::LoadingToEnd,
            State::MovingToEnd,
            State::WaitingToLoad,
            State::WaitingToUnload,
            State::UnloadingNow,
            State::UnloadingTimed { dwelling: false },
            State::UnloadingTimed { dwelling: true },
            State::Buffering,
            State::BufferingTimed { dwelling: false },
            State::BufferingTimed { dwelling: true },
        ];

        for (i, a) in states.iter().enumerate() {
            for b in &states[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }
}
