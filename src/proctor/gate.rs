// src/proctor/gate.rs

use std::{collections::VecDeque, fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message surfaced to the candidate when the unlock identity does not match.
pub const IDENTITY_MISMATCH_MESSAGE: &str = "Incorrect User ID. Please try again.";

/// Named events that lock the exam when delivered while unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    CameraUnavailable,
    FaceNotDetected,
    ExcessiveMovement,
    TabbedOut,
    RandomCheck,
}

impl LockReason {
    /// Text shown on the lock screen.
    pub fn message(self) -> &'static str {
        match self {
            LockReason::CameraUnavailable => "Camera access denied or failed.",
            LockReason::FaceNotDetected => "Face not detected or covered.",
            LockReason::ExcessiveMovement => "Excessive head/eye movement detected.",
            LockReason::TabbedOut => "Tabbed out of the exam.",
            LockReason::RandomCheck => "Random security check.",
        }
    }
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Proctoring gate state. The reason is carried only by the locked variant.
#[derive(Debug, Clone, PartialEq)]
pub enum LockState {
    Unlocked,
    Locked {
        reason: LockReason,
        locked_at: DateTime<Utc>,
        /// Session time at which the lock happened.
        since: Duration,
    },
}

impl LockState {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Locked { .. })
    }

    pub fn reason(&self) -> Option<LockReason> {
        match self {
            LockState::Locked { reason, .. } => Some(*reason),
            LockState::Unlocked => None,
        }
    }
}

/// Result of delivering a trigger to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Unlocked -> Locked. The caller must halt the timer and detector.
    Locked,
    /// Already locked; the first reason wins and this one is dropped.
    Ignored,
    /// An unlock handshake is in flight; the trigger is held until it resolves.
    Deferred,
}

/// Resolution of an unlock handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Locked -> Unlocked. `deferred` holds triggers that arrived during the
    /// handshake and must be replayed in order.
    Accepted { deferred: Vec<LockReason> },
    /// Identity did not match. The gate stays locked; deferred triggers were
    /// replayed and dropped under first-reason-wins.
    Rejected { dropped: Vec<LockReason> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Handshake {
    Idle,
    Verifying { matched: bool },
}

/// Gate errors are local and never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    NotLocked,
    HandshakeInProgress,
    NoHandshake,
}

/// The single authority over [`LockState`].
///
/// Triggers may arrive from any source at any time; only the first one while
/// unlocked takes effect. Unlocking is a two-phase handshake so that triggers
/// observed between `begin_unlock` and `finish_unlock` are replayed instead of
/// lost.
#[derive(Debug)]
pub struct LockGate {
    identity: String,
    state: LockState,
    handshake: Handshake,
    deferred: VecDeque<LockReason>,
}

impl LockGate {
    /// Creates an unlocked gate bound to the identity authenticated at login.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            state: LockState::Unlocked,
            handshake: Handshake::Idle,
            deferred: VecDeque::new(),
        }
    }

    pub fn state(&self) -> &LockState {
        &self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn handshake_in_flight(&self) -> bool {
        matches!(self.handshake, Handshake::Verifying { .. })
    }

    pub fn trigger(&mut self, reason: LockReason, now: Duration) -> TriggerOutcome {
        if self.handshake_in_flight() {
            tracing::debug!(?reason, "Trigger deferred until unlock handshake resolves");
            self.deferred.push_back(reason);
            return TriggerOutcome::Deferred;
        }

        if let LockState::Locked { reason: current, .. } = &self.state {
            tracing::debug!(dropped = ?reason, current = ?current, "Gate already locked");
            return TriggerOutcome::Ignored;
        }

        tracing::warn!("Locking exam: {}", reason);
        self.state = LockState::Locked {
            reason,
            locked_at: Utc::now(),
            since: now,
        };
        TriggerOutcome::Locked
    }

    /// Opens the unlock handshake. The identity comparison is exact.
    pub fn begin_unlock(&mut self, candidate: &str) -> Result<(), GateError> {
        if !self.is_locked() {
            return Err(GateError::NotLocked);
        }
        if self.handshake_in_flight() {
            return Err(GateError::HandshakeInProgress);
        }

        self.handshake = Handshake::Verifying {
            matched: candidate == self.identity,
        };
        Ok(())
    }

    /// Resolves the open handshake and hands back any deferred triggers.
    pub fn finish_unlock(&mut self) -> Result<UnlockOutcome, GateError> {
        let matched = match std::mem::replace(&mut self.handshake, Handshake::Idle) {
            Handshake::Verifying { matched } => matched,
            Handshake::Idle => return Err(GateError::NoHandshake),
        };

        let deferred: Vec<LockReason> = self.deferred.drain(..).collect();

        if matched {
            tracing::info!("Exam unlocked after identity re-entry");
            self.state = LockState::Unlocked;
            Ok(UnlockOutcome::Accepted { deferred })
        } else {
            tracing::info!("Unlock rejected: identity mismatch");
            for reason in &deferred {
                tracing::debug!(?reason, "Deferred trigger dropped, gate still locked");
            }
            Ok(UnlockOutcome::Rejected { dropped: deferred })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: Duration = Duration::from_secs(0);

    #[test]
    fn test_first_reason_wins() {
        let mut gate = LockGate::new("U123");

        assert_eq!(gate.trigger(LockReason::TabbedOut, T0), TriggerOutcome::Locked);
        assert_eq!(
            gate.trigger(LockReason::ExcessiveMovement, T0),
            TriggerOutcome::Ignored
        );
        assert_eq!(gate.state().reason(), Some(LockReason::TabbedOut));
    }

    #[test]
    fn test_reason_present_iff_locked() {
        let mut gate = LockGate::new("U123");
        assert_eq!(gate.state().reason(), None);

        gate.trigger(LockReason::RandomCheck, T0);
        assert!(gate.state().reason().is_some());

        gate.begin_unlock("U123").unwrap();
        gate.finish_unlock().unwrap();
        assert_eq!(gate.state(), &LockState::Unlocked);
        assert_eq!(gate.state().reason(), None);
    }

    #[test]
    fn test_wrong_identity_then_right_identity() {
        let mut gate = LockGate::new("U123");
        gate.trigger(LockReason::TabbedOut, T0);

        gate.begin_unlock("wrong").unwrap();
        assert_eq!(
            gate.finish_unlock().unwrap(),
            UnlockOutcome::Rejected { dropped: vec![] }
        );
        assert!(gate.is_locked());

        gate.begin_unlock("U123").unwrap();
        assert_eq!(
            gate.finish_unlock().unwrap(),
            UnlockOutcome::Accepted { deferred: vec![] }
        );
        assert!(!gate.is_locked());
    }

    #[test]
    fn test_identity_match_is_case_sensitive() {
        let mut gate = LockGate::new("U123");
        gate.trigger(LockReason::TabbedOut, T0);
        gate.begin_unlock("u123").unwrap();
        assert!(matches!(
            gate.finish_unlock().unwrap(),
            UnlockOutcome::Rejected { .. }
        ));
    }

    #[test]
    fn test_triggers_during_handshake_are_deferred() {
        let mut gate = LockGate::new("U123");
        gate.trigger(LockReason::FaceNotDetected, T0);

        gate.begin_unlock("U123").unwrap();
        assert_eq!(
            gate.trigger(LockReason::TabbedOut, T0),
            TriggerOutcome::Deferred
        );
        assert_eq!(
            gate.trigger(LockReason::RandomCheck, T0),
            TriggerOutcome::Deferred
        );

        let outcome = gate.finish_unlock().unwrap();
        assert_eq!(
            outcome,
            UnlockOutcome::Accepted {
                deferred: vec![LockReason::TabbedOut, LockReason::RandomCheck]
            }
        );
    }

    #[test]
    fn test_unlock_requires_lock_and_single_handshake() {
        let mut gate = LockGate::new("U123");
        assert_eq!(gate.begin_unlock("U123"), Err(GateError::NotLocked));
        assert_eq!(gate.finish_unlock(), Err(GateError::NoHandshake));

        gate.trigger(LockReason::TabbedOut, T0);
        gate.begin_unlock("U123").unwrap();
        assert_eq!(
            gate.begin_unlock("U123"),
            Err(GateError::HandshakeInProgress)
        );
    }

    #[test]
    fn test_unlimited_retries() {
        let mut gate = LockGate::new("U123");
        gate.trigger(LockReason::TabbedOut, T0);

        for _ in 0..50 {
            gate.begin_unlock("nope").unwrap();
            gate.finish_unlock().unwrap();
        }

        gate.begin_unlock("U123").unwrap();
        assert!(matches!(
            gate.finish_unlock().unwrap(),
            UnlockOutcome::Accepted { .. }
        ));
    }
}
