// src/proctor/scheduler.rs

use std::{collections::BTreeMap, time::Duration};

/// Timed tasks a session can register. The declaration order breaks ties
/// between tasks due at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskKind {
    Tick,
    Poll,
    Probe,
    CameraGrace,
}

/// Cancelable one-shot registrations keyed by task kind, on session time.
///
/// Periodic behaviour is obtained by re-registering after each firing, so a
/// cancelled task can never fire late.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: BTreeMap<TaskKind, Duration>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `kind` at `at`, replacing an earlier registration.
    pub fn schedule(&mut self, kind: TaskKind, at: Duration) {
        self.tasks.insert(kind, at);
    }

    pub fn cancel(&mut self, kind: TaskKind) -> bool {
        self.tasks.remove(&kind).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    pub fn is_scheduled(&self, kind: TaskKind) -> bool {
        self.tasks.contains_key(&kind)
    }

    pub fn deadline(&self, kind: TaskKind) -> Option<Duration> {
        self.tasks.get(&kind).copied()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.tasks.values().min().copied()
    }

    /// Removes and returns the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TaskKind, Duration)> {
        let (kind, at) = self
            .tasks
            .iter()
            .filter(|(_, at)| **at <= now)
            .min_by_key(|(kind, at)| (**at, **kind))
            .map(|(kind, at)| (*kind, *at))?;
        self.tasks.remove(&kind);
        Some((kind, at))
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
