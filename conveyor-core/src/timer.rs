//! Countdown timers
//!
//! Deadlines on the caller's millisecond clock, checked once per control tick.
//! Arithmetic wraps, so a `u32` clock rolling over after ~49 days is fine.
//! Durations are capped at [`MAX_DURATION_MS`] (~24.8 days).

/// Longest countdown the wrapping comparison can represent
pub const MAX_DURATION_MS: u32 = i32::MAX as u32;

/// A one-shot deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Countdown {
    deadline: Option<u32>,
}

impl Countdown {
    /// Create a disarmed countdown
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm to expire `duration_ms` after `now_ms`, capped at [`MAX_DURATION_MS`]
    pub fn arm(&mut self, now_ms: u32, duration_ms: u32) {
        let duration_ms = duration_ms.min(MAX_DURATION_MS);
        self.deadline = Some(now_ms.wrapping_add(duration_ms));
    }

    /// Disarm
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Check if the countdown is running or expired but not cancelled
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Check if an armed countdown has reached its deadline
    pub fn expired(&self, now_ms: u32) -> bool {
        match self.deadline {
            Some(deadline) => now_ms.wrapping_sub(deadline) as i32 >= 0,
            None => false,
        }
    }

    /// Milliseconds left, `None` when disarmed
    pub fn remaining_ms(&self, now_ms: u32) -> Option<u32> {
        self.deadline
            .map(|deadline| (deadline.wrapping_sub(now_ms) as i32).max(0) as u32)
    }
}
