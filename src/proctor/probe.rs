// src/proctor/probe.rs

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Inclusive window, measured from session start, in which the probe fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeWindow {
    pub earliest: Duration,
    pub latest: Duration,
}

impl Default for ProbeWindow {
    fn default() -> Self {
        Self {
            earliest: Duration::from_secs(60),
            latest: Duration::from_secs(120),
        }
    }
}

impl ProbeWindow {
    /// Draws one offset with millisecond granularity, uniformly in the window.
    pub fn draw(&self, rng: &mut impl Rng) -> Duration {
        let lo = self.earliest.as_millis() as u64;
        let hi = (self.latest.as_millis() as u64).max(lo);
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeState {
    Armed,
    /// Fell due while the exam was locked; fires on the next unlock.
    Overdue,
    Retired,
}

/// Single-shot randomized integrity check.
#[derive(Debug, Clone)]
pub struct RandomProbe {
    deadline: Duration,
    state: ProbeState,
}

impl RandomProbe {
    pub fn seeded(window: ProbeWindow, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            deadline: window.draw(&mut rng),
            state: ProbeState::Armed,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.state == ProbeState::Armed
    }

    pub fn is_retired(&self) -> bool {
        self.state == ProbeState::Retired
    }

    /// The probe's deadline passed. Returns `true` when it should fire now.
    pub fn fall_due(&mut self, locked: bool) -> bool {
        match self.state {
            ProbeState::Armed if locked => {
                self.state = ProbeState::Overdue;
                false
            }
            ProbeState::Armed => {
                self.state = ProbeState::Retired;
                true
            }
            ProbeState::Overdue | ProbeState::Retired => false,
        }
    }

    /// Called on unlock. Returns `true` when an overdue probe should fire now.
    pub fn take_overdue(&mut self) -> bool {
        if self.state == ProbeState::Overdue {
            self.state = ProbeState::Retired;
            true
        } else {
            false
        }
    }

    pub fn retire(&mut self) {
        self.state = ProbeState::Retired;
    }
}
