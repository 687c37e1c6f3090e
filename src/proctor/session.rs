// src/proctor/session.rs

use std::{collections::VecDeque, fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::ProctoringConfig,
    models::question::{Language, Question},
    proctor::{
        clock::{ClockSnapshot, CountdownTimer, TickOutcome},
        detector::{
            DetectorThresholds, FaceAnomalyDetector, FaceSample, Observation, ProctoringStatus,
        },
        gate::{
            GateError, IDENTITY_MISMATCH_MESSAGE, LockGate, LockReason, LockState, TriggerOutcome,
            UnlockOutcome,
        },
        ledger::{AnswerLedger, compute_score},
        probe::{ProbeWindow, RandomProbe},
        scheduler::{Scheduler, TaskKind},
    },
};

/// Errors returned by session operations. None of them end the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Exam content is not reachable while the gate is locked.
    Locked,
    /// The session already reached its terminal state.
    Submitted,
    UnknownQuestion(i64),
    NotLocked,
    IdentityMismatch,
    HandshakeInProgress,
    NoHandshake,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Locked => f.write_str("Exam is locked"),
            SessionError::Submitted => f.write_str("Exam has already been submitted"),
            SessionError::UnknownQuestion(id) => write!(f, "Question {} is not part of this exam", id),
            SessionError::NotLocked => f.write_str("Exam is not locked"),
            SessionError::IdentityMismatch => f.write_str(IDENTITY_MISMATCH_MESSAGE),
            SessionError::HandshakeInProgress => f.write_str("An unlock is already in progress"),
            SessionError::NoHandshake => f.write_str("No unlock in progress"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<GateError> for SessionError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::NotLocked => SessionError::NotLocked,
            GateError::HandshakeInProgress => SessionError::HandshakeInProgress,
            GateError::NoHandshake => SessionError::NoHandshake,
        }
    }
}

/// Why the exam was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitCause {
    Candidate,
    TimeExpired,
}

/// Final result handed to the results boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamOutcome {
    pub score: u32,
    /// Derived from the loaded question set.
    pub total_questions: usize,
    pub cause: SubmitCause,
    pub remaining_secs: u32,
    pub submitted_at: DateTime<Utc>,
}

/// A detector poll fell due; the driver must run the detector and report
/// back through [`ExamSession::complete_poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPoll {
    pub due: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraState {
    Pending,
    Acquired,
    Failed,
}

/// Read-only view published after every step.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub language: Language,
    pub locked: bool,
    pub lock_code: Option<LockReason>,
    pub lock_reason: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub clock: ClockSnapshot,
    pub proctoring_status: ProctoringStatus,
    pub camera: CameraState,
    pub answered: usize,
    pub total_questions: usize,
    pub outcome: Option<ExamOutcome>,
}

/// Timing parameters the session schedules with.
#[derive(Debug, Clone, Copy)]
struct Cadence {
    tick: Duration,
    poll: Duration,
    camera_grace: Duration,
    recalibrate_on_resume: bool,
}

/// Proctored exam session controller.
///
/// Runs entirely on session time (`Duration` since start) supplied by the
/// caller, so it can be driven by a tokio actor or by a test with a virtual
/// clock. Triggers from every source go through one queue drained by the
/// lock gate, in the order they were raised.
#[derive(Debug)]
pub struct ExamSession {
    id: Uuid,
    language: Language,
    questions: Vec<Question>,
    ledger: AnswerLedger,
    clock: CountdownTimer,
    detector: FaceAnomalyDetector,
    gate: LockGate,
    probe: RandomProbe,
    scheduler: Scheduler,
    queue: VecDeque<LockReason>,
    cadence: Cadence,
    camera: CameraState,
    camera_overdue: bool,
    poll_outstanding: bool,
    outcome: Option<ExamOutcome>,
}

impl ExamSession {
    /// Starts a session for an authenticated identity.
    ///
    /// The countdown and the random probe are registered immediately; face
    /// polling waits for the camera.
    pub fn start(
        identity: impl Into<String>,
        language: Language,
        questions: Vec<Question>,
        config: &ProctoringConfig,
        probe_seed: u64,
    ) -> Self {
        let window = ProbeWindow {
            earliest: config.probe_earliest,
            latest: config.probe_latest,
        };
        let thresholds = DetectorThresholds {
            max_consecutive_misses: config.no_face_threshold,
            max_normalized_displacement: config.movement_threshold,
        };
        let cadence = Cadence {
            tick: config.tick_interval,
            poll: config.poll_interval,
            camera_grace: config.camera_grace,
            recalibrate_on_resume: config.recalibrate_on_resume,
        };

        let probe = RandomProbe::seeded(window, probe_seed);
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TaskKind::Tick, cadence.tick);
        scheduler.schedule(TaskKind::Probe, probe.deadline());

        let session = Self {
            id: Uuid::new_v4(),
            language,
            ledger: AnswerLedger::for_questions(&questions),
            questions,
            clock: CountdownTimer::new(config.exam_duration_secs),
            detector: FaceAnomalyDetector::new(thresholds),
            gate: LockGate::new(identity),
            probe,
            scheduler,
            queue: VecDeque::new(),
            cadence,
            camera: CameraState::Pending,
            camera_overdue: false,
            poll_outstanding: false,
            outcome: None,
        };

        tracing::info!(
            session_id = %session.id,
            language = %language,
            questions = session.questions.len(),
            probe_at_ms = session.probe.deadline().as_millis() as u64,
            "Exam session started"
        );
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &str {
        self.gate.identity()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn is_locked(&self) -> bool {
        self.gate.is_locked()
    }

    pub fn lock_reason(&self) -> Option<LockReason> {
        self.gate.state().reason()
    }

    pub fn is_submitted(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&ExamOutcome> {
        self.outcome.as_ref()
    }

    pub fn remaining_secs(&self) -> u32 {
        self.clock.remaining_secs()
    }

    pub fn proctoring_status(&self) -> ProctoringStatus {
        self.detector.status()
    }

    pub fn detector(&self) -> &FaceAnomalyDetector {
        &self.detector
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    /// Earliest registered task, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    /// Question content, unreachable while locked.
    pub fn questions(&self) -> Result<&[Question], SessionError> {
        self.ensure_open()?;
        Ok(&self.questions)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    // ---------------------------------------------------------------------
    // Signal sources
    // ---------------------------------------------------------------------

    /// Camera stream is live: face polling begins.
    pub fn camera_acquired(&mut self, now: Duration) {
        if self.is_submitted() || self.camera != CameraState::Pending {
            return;
        }

        self.camera = CameraState::Acquired;
        self.detector.arm();
        if !self.gate.is_locked() {
            self.scheduler.schedule(TaskKind::Poll, now + self.cadence.poll);
        }
        tracing::info!(session_id = %self.id, "Camera acquired, calibrating");
    }

    /// Camera or detector model could not be acquired. The session locks
    /// after the grace delay.
    pub fn camera_failed(&mut self, now: Duration, detail: &str) {
        if self.is_submitted() || self.camera != CameraState::Pending {
            return;
        }

        self.camera = CameraState::Failed;
        self.detector.fail();
        self.scheduler
            .schedule(TaskKind::CameraGrace, now + self.cadence.camera_grace);
        tracing::error!(session_id = %self.id, "Error initializing camera: {}", detail);
    }

    /// Page visibility report from the client.
    pub fn report_visibility(&mut self, now: Duration, hidden: bool) -> Result<(), SessionError> {
        if self.is_submitted() {
            return Err(SessionError::Submitted);
        }
        if hidden {
            self.raise(LockReason::TabbedOut, now);
        }
        Ok(())
    }

    /// Runs every task due at or before `now`.
    ///
    /// Stops early and returns the poll when the detector has to be consulted;
    /// the caller then calls [`ExamSession::complete_poll`] and advances again.
    pub fn advance(&mut self, now: Duration) -> Option<PendingPoll> {
        while !self.is_submitted() {
            let (kind, due) = self.scheduler.pop_due(now)?;
            match kind {
                TaskKind::Tick => self.on_tick(due),
                TaskKind::Poll => {
                    self.poll_outstanding = true;
                    return Some(PendingPoll { due });
                }
                TaskKind::Probe => self.on_probe(due),
                TaskKind::CameraGrace => self.on_camera_grace(due),
            }
        }
        None
    }

    /// Feeds the detector result of the outstanding poll.
    ///
    /// The next poll is registered one interval after completion, so polls
    /// never overlap. Results arriving after a lock or submission are dropped.
    pub fn complete_poll(
        &mut self,
        now: Duration,
        sample: Option<FaceSample>,
    ) -> Option<Observation> {
        if !std::mem::take(&mut self.poll_outstanding) {
            return None;
        }
        if self.is_submitted() || self.gate.is_locked() || !self.detector.is_armed() {
            return None;
        }

        let observation = self.detector.observe(sample);
        tracing::debug!(session_id = %self.id, ?observation, "Face poll");

        match observation {
            Observation::Anomaly(reason) => self.raise(reason, now),
            _ => self
                .scheduler
                .schedule(TaskKind::Poll, now + self.cadence.poll),
        }
        Some(observation)
    }

    // ---------------------------------------------------------------------
    // Candidate operations
    // ---------------------------------------------------------------------

    pub fn select_answer(
        &mut self,
        question_id: i64,
        option: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        if !self.ledger.select(question_id, option) {
            return Err(SessionError::UnknownQuestion(question_id));
        }
        Ok(())
    }

    /// Opens the unlock handshake with the re-entered identity.
    pub fn begin_unlock(&mut self, candidate: &str) -> Result<(), SessionError> {
        if self.is_submitted() {
            return Err(SessionError::Submitted);
        }
        self.gate.begin_unlock(candidate)?;
        Ok(())
    }

    /// Resolves the handshake. On acceptance the timer and detector resume
    /// and held triggers are replayed, which may lock the exam again at once.
    pub fn finish_unlock(&mut self, now: Duration) -> Result<(), SessionError> {
        match self.gate.finish_unlock()? {
            UnlockOutcome::Accepted { deferred } => {
                self.resume(now);

                // One held one-shot per unlock; the other stays held if the
                // first locks again.
                if std::mem::take(&mut self.camera_overdue) {
                    self.queue.push_back(LockReason::CameraUnavailable);
                } else if self.probe.take_overdue() {
                    self.queue.push_back(LockReason::RandomCheck);
                }
                self.queue.extend(deferred);
                self.drain(now);
                Ok(())
            }
            UnlockOutcome::Rejected { .. } => Err(SessionError::IdentityMismatch),
        }
    }

    /// Full unlock: opens the handshake, lets tasks due at `now` fire against
    /// it, then resolves it.
    pub fn attempt_unlock(&mut self, now: Duration, candidate: &str) -> Result<(), SessionError> {
        self.begin_unlock(candidate)?;
        let pending = self.advance(now);
        debug_assert!(pending.is_none(), "polling is cancelled while locked");
        self.finish_unlock(now)
    }

    /// Submits the exam. Idempotent: later calls return the first outcome.
    ///
    /// A candidate cannot submit while locked; timer expiry cannot happen
    /// while locked because ticks are suspended.
    pub fn submit(&mut self, now: Duration, cause: SubmitCause) -> Result<ExamOutcome, SessionError> {
        if let Some(outcome) = &self.outcome {
            return Ok(outcome.clone());
        }
        if cause == SubmitCause::Candidate && self.gate.is_locked() {
            return Err(SessionError::Locked);
        }
        Ok(self.finish(now, cause))
    }

    /// Current score over the loaded set. Pure.
    pub fn compute_score(&self) -> u32 {
        compute_score(&self.questions, &self.ledger)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let (locked_at, lock_code) = match self.gate.state() {
            LockState::Locked {
                reason, locked_at, ..
            } => (Some(*locked_at), Some(*reason)),
            LockState::Unlocked => (None, None),
        };

        SessionSnapshot {
            session_id: self.id,
            language: self.language,
            locked: lock_code.is_some(),
            lock_code,
            lock_reason: lock_code.map(|r| r.message().to_string()),
            locked_at,
            clock: self.clock.snapshot(),
            proctoring_status: self.detector.status(),
            camera: self.camera,
            answered: self.ledger.answered(),
            total_questions: self.questions.len(),
            outcome: self.outcome.clone(),
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_submitted() {
            return Err(SessionError::Submitted);
        }
        if self.gate.is_locked() {
            return Err(SessionError::Locked);
        }
        Ok(())
    }

    fn raise(&mut self, reason: LockReason, now: Duration) {
        self.queue.push_back(reason);
        self.drain(now);
    }

    fn drain(&mut self, now: Duration) {
        while let Some(reason) = self.queue.pop_front() {
            if self.gate.trigger(reason, now) == TriggerOutcome::Locked {
                self.halt();
            }
        }
    }

    /// Lock side effects. The camera stays acquired and the probe stays
    /// registered.
    fn halt(&mut self) {
        self.scheduler.cancel(TaskKind::Tick);
        self.scheduler.cancel(TaskKind::Poll);
        self.poll_outstanding = false;
        self.detector.suspend();
    }

    fn resume(&mut self, now: Duration) {
        if !self.clock.is_expired() {
            self.scheduler.schedule(TaskKind::Tick, now + self.cadence.tick);
        }
        if self.camera == CameraState::Acquired {
            self.detector.resume(self.cadence.recalibrate_on_resume);
            if self.detector.is_armed() {
                self.scheduler.schedule(TaskKind::Poll, now + self.cadence.poll);
            }
        }
    }

    /// True when a one-shot source falling due now must be held for the next
    /// successful unlock. This includes an open handshake: if it is rejected
    /// the held trigger survives for the following attempt.
    fn holds_one_shots(&self) -> bool {
        // Departs from first-reason-wins on purpose: the probe and the camera
        // lock fire once per session, so dropping them would skip the check
        // (or leave a dead camera unreported) for the rest of the exam.
        self.gate.is_locked()
    }

    fn on_tick(&mut self, due: Duration) {
        match self.clock.tick() {
            TickOutcome::Running(_) => {
                self.scheduler.schedule(TaskKind::Tick, due + self.cadence.tick);
            }
            TickOutcome::Expired => {
                tracing::info!(session_id = %self.id, "Exam time expired, forcing submission");
                self.finish(due, SubmitCause::TimeExpired);
            }
            TickOutcome::Stopped => {}
        }
    }

    fn on_probe(&mut self, due: Duration) {
        let hold = self.holds_one_shots();
        if self.probe.fall_due(hold) {
            self.raise(LockReason::RandomCheck, due);
        } else if hold {
            tracing::debug!(session_id = %self.id, "Random check held until unlock");
        }
    }

    fn on_camera_grace(&mut self, due: Duration) {
        if self.holds_one_shots() {
            self.camera_overdue = true;
            tracing::debug!(session_id = %self.id, "Camera lock held until unlock");
        } else {
            self.raise(LockReason::CameraUnavailable, due);
        }
    }

    fn finish(&mut self, now: Duration, cause: SubmitCause) -> ExamOutcome {
        self.scheduler.cancel_all();
        self.detector.suspend();
        self.probe.retire();
        self.poll_outstanding = false;
        self.queue.clear();

        let outcome = ExamOutcome {
            score: self.compute_score(),
            total_questions: self.questions.len(),
            cause,
            remaining_secs: self.clock.remaining_secs(),
            submitted_at: Utc::now(),
        };
        tracing::info!(
            session_id = %self.id,
            score = outcome.score,
            total = outcome.total_questions,
            ?cause,
            elapsed_ms = now.as_millis() as u64,
            "Exam submitted"
        );
        self.outcome = Some(outcome.clone());
        outcome
    }
}
