// src/proctor/clock.rs

use serde::Serialize;

/// Remaining time below which the exam screen highlights the clock.
pub const LOW_TIME_SECS: u32 = 300;

/// Outcome of a single countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Time is still left on the clock.
    Running(u32),
    /// This tick consumed the last second. Reported exactly once.
    Expired,
    /// The clock already expired; the tick had no effect.
    Stopped,
}

/// One-second resolution countdown bounded to the exam duration.
///
/// The timer itself knows nothing about locking: the session simply stops
/// scheduling ticks while locked, which freezes the remaining time.
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    total_secs: u32,
    remaining_secs: u32,
    expired: bool,
}

impl CountdownTimer {
    pub fn new(total_secs: u32) -> Self {
        Self {
            total_secs,
            remaining_secs: total_secs,
            expired: total_secs == 0,
        }
    }

    /// Decrements the clock by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.expired {
            return TickOutcome::Stopped;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);

        if self.remaining_secs == 0 {
            self.expired = true;
            TickOutcome::Expired
        } else {
            TickOutcome::Running(self.remaining_secs)
        }
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            remaining_secs: self.remaining_secs,
            total_secs: self.total_secs,
            display: format_mm_ss(self.remaining_secs),
            low_time: self.remaining_secs < LOW_TIME_SECS,
        }
    }
}

/// Serializable view of the clock for the status endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClockSnapshot {
    pub remaining_secs: u32,
    pub total_secs: u32,
    /// Remaining time as `MM:SS`.
    pub display: String,
    pub low_time: bool,
}

/// Formats seconds as zero-padded `MM:SS` (minutes are not wrapped at 60).
pub fn format_mm_ss(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
