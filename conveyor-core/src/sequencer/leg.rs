//! Sensor-driven belt legs
//!
//! A leg is one run of the belt toward a sensor goal:
//!
//! - `Middle`: run until the middle sensor sees the board
//! - `End`: run until the exit sensor sees the board
//! - `Depart`: run until the exit sensor has seen the board and then cleared
//!   (debounced), plus the configured run-on time
//!
//! Every leg carries its own timeout. Run-on is not subject to it.

use crate::config::TimingConfig;
use crate::sensor::SensorSnapshot;
use crate::timer::Countdown;

/// Where the leg takes the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LegGoal {
    Middle,
    End,
    Depart,
}

impl LegGoal {
    /// Timeout for this kind of leg
    pub fn timeout_ms(self, timing: &TimingConfig) -> u32 {
        match self {
            LegGoal::Middle | LegGoal::End => timing.load_timeout_ms(),
            LegGoal::Depart => timing.unload_timeout_ms(),
        }
    }

    /// Check if this leg takes a board off the conveyor
    pub fn is_unload(self) -> bool {
        self == LegGoal::Depart
    }
}

/// Progress within a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LegPhase {
    /// Waiting for the goal sensor to trip
    Seeking,
    /// Board at the exit, waiting for it to clear
    Clearing,
    /// Board gone, belt running on
    RunOn,
}

/// Outcome of a leg update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LegStatus {
    Running,
    Complete,
    TimedOut,
}

/// One belt run toward a goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Leg {
    goal: LegGoal,
    phase: LegPhase,
    timeout: Countdown,
    run_on: Countdown,
}

impl Leg {
    /// Start a leg at `now_ms`
    ///
    /// A departing board that already sits on the exit sensor skips straight
    /// to waiting for it to clear.
    pub fn start(goal: LegGoal, snapshot: &SensorSnapshot, now_ms: u32, timeout_ms: u32) -> Self {
        let phase = if goal == LegGoal::Depart && snapshot.exit_present {
            LegPhase::Clearing
        } else {
            LegPhase::Seeking
        };

        let mut timeout = Countdown::new();
        timeout.arm(now_ms, timeout_ms);

        Self {
            goal,
            phase,
            timeout,
            run_on: Countdown::new(),
        }
    }

    /// Leg goal
    pub fn goal(&self) -> LegGoal {
        self.goal
    }

    /// Current phase
    pub fn phase(&self) -> LegPhase {
        self.phase
    }

    /// Advance against the latest snapshot
    pub fn update(&mut self, snapshot: &SensorSnapshot, now_ms: u32, runon_ms: u32) -> LegStatus {
        loop {
            match self.phase {
                LegPhase::Seeking => {
                    let reached = match self.goal {
                        LegGoal::Middle => snapshot.middle_present,
                        LegGoal::End | LegGoal::Depart => snapshot.exit_present,
                    };
                    if !reached {
                        break;
                    }
                    if self.goal != LegGoal::Depart {
                        return LegStatus::Complete;
                    }
                    self.phase = LegPhase::Clearing;
                }
                LegPhase::Clearing => {
                    if snapshot.exit_present {
                        break;
                    }
                    if runon_ms == 0 {
                        return LegStatus::Complete;
                    }
                    self.run_on.arm(now_ms, runon_ms);
                    self.phase = LegPhase::RunOn;
                }
                LegPhase::RunOn => {
                    return if self.run_on.expired(now_ms) {
                        LegStatus::Complete
                    } else {
                        LegStatus::Running
                    };
                }
            }
        }

        if self.timeout.expired(now_ms) {
            LegStatus::TimedOut
        } else {
            LegStatus::Running
        }
    }
}
