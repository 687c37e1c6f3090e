// src/proctor/runtime.rs

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot, watch},
    time::Instant,
};
use uuid::Uuid;

use crate::{
    models::question::Question,
    proctor::{
        device::{CaptureDevice, CaptureError, FaceDetector},
        session::{ExamOutcome, ExamSession, SessionError, SessionSnapshot, SubmitCause},
    },
};

const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;
type AcquireFuture = Pin<Box<dyn Future<Output = Result<(), CaptureError>> + Send>>;

/// Requests executed on the session's execution context.
#[derive(Debug)]
pub enum SessionCommand {
    Questions { reply: Reply<Vec<Question>> },
    SelectAnswer { question_id: i64, option: String, reply: Reply<()> },
    Visibility { hidden: bool, reply: Reply<()> },
    Unlock { candidate: String, reply: Reply<()> },
    Submit { reply: Reply<ExamOutcome> },
}

/// Cloneable handle to a running session actor.
///
/// Status reads go through a `watch` channel, so they keep working after the
/// actor has exited (for example after a forced submission on timeout).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    identity: Arc<str>,
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.snapshots.borrow().outcome.is_some() || self.commands.is_closed()
    }

    /// Resolves once the session has published an outcome or the actor exited.
    pub async fn finished(&self) -> Option<ExamOutcome> {
        let mut rx = self.snapshots.clone();
        loop {
            if let Some(outcome) = rx.borrow_and_update().outcome.clone() {
                return Some(outcome);
            }
            if rx.changed().await.is_err() {
                return rx.borrow().outcome.clone();
            }
        }
    }

    pub async fn questions(&self) -> Result<Vec<Question>, SessionError> {
        self.request(|reply| SessionCommand::Questions { reply }).await
    }

    pub async fn select_answer(&self, question_id: i64, option: String) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::SelectAnswer {
            question_id,
            option,
            reply,
        })
        .await
    }

    pub async fn report_visibility(&self, hidden: bool) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Visibility { hidden, reply })
            .await
    }

    pub async fn unlock(&self, candidate: String) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Unlock { candidate, reply })
            .await
    }

    /// Candidate submission. Returns the stored outcome when the session has
    /// already been submitted.
    pub async fn submit(&self) -> Result<ExamOutcome, SessionError> {
        match self.request(|reply| SessionCommand::Submit { reply }).await {
            Err(SessionError::Submitted) => {
                self.snapshot().outcome.ok_or(SessionError::Submitted)
            }
            other => other,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(build(reply)).await.is_err() {
            return Err(SessionError::Submitted);
        }
        rx.await.unwrap_or(Err(SessionError::Submitted))
    }
}

/// Spawns the actor that owns `session` and drives its timers, detector
/// polls and camera lifecycle on a single task.
pub fn spawn_session(
    session: ExamSession,
    detector: Arc<dyn FaceDetector>,
    camera: Arc<dyn CaptureDevice>,
) -> SessionHandle {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshots_tx, snapshots_rx) = watch::channel(session.snapshot());

    let handle = SessionHandle {
        id: session.id(),
        identity: Arc::from(session.identity()),
        commands: commands_tx,
        snapshots: snapshots_rx,
    };

    let actor = SessionActor {
        session,
        detector,
        camera,
        commands: commands_rx,
        snapshots: snapshots_tx,
        started: Instant::now(),
    };
    tokio::spawn(actor.run());

    handle
}

struct SessionActor {
    session: ExamSession,
    detector: Arc<dyn FaceDetector>,
    camera: Arc<dyn CaptureDevice>,
    commands: mpsc::Receiver<SessionCommand>,
    snapshots: watch::Sender<SessionSnapshot>,
    started: Instant,
}

impl SessionActor {
    async fn run(mut self) {
        let session_id = self.session.id();
        let camera = self.camera.clone();
        let mut acquisition: Option<AcquireFuture> =
            Some(Box::pin(async move { camera.acquire().await }));

        while !self.session.is_submitted() {
            let deadline = self
                .session
                .next_deadline()
                .map(|offset| self.started + offset);

            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::info!(%session_id, "All session handles dropped, abandoning exam");
                        break;
                    };
                    self.advance().await;
                    self.handle(command);
                }
                result = poll_acquisition(&mut acquisition), if acquisition.is_some() => {
                    acquisition = None;
                    self.advance().await;
                    let now = self.now();
                    match result {
                        Ok(()) => self.session.camera_acquired(now),
                        Err(err) => self.session.camera_failed(now, &err.to_string()),
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.advance().await;
                }
            }

            self.publish();
        }

        // Single exit point: the capture device is released exactly once.
        drop(acquisition);
        self.camera.release().await;
        self.publish();
        tracing::debug!(%session_id, "Session actor stopped");
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    /// Runs every due task, awaiting the detector whenever a poll falls due.
    async fn advance(&mut self) {
        loop {
            let now = self.now();
            if self.session.advance(now).is_none() {
                break;
            }
            let sample = self.detector.detect().await;
            let now = self.now();
            self.session.complete_poll(now, sample);
        }
    }

    fn handle(&mut self, command: SessionCommand) {
        let now = self.now();
        match command {
            SessionCommand::Questions { reply } => {
                let result = self.session.questions().map(<[Question]>::to_vec);
                self.reply(reply, result);
            }
            SessionCommand::SelectAnswer {
                question_id,
                option,
                reply,
            } => {
                let result = self.session.select_answer(question_id, option);
                self.reply(reply, result);
            }
            SessionCommand::Visibility { hidden, reply } => {
                let result = self.session.report_visibility(now, hidden);
                self.reply(reply, result);
            }
            SessionCommand::Unlock { candidate, reply } => {
                let result = self.session.attempt_unlock(now, &candidate);
                self.reply(reply, result);
            }
            SessionCommand::Submit { reply } => {
                let result = self.session.submit(now, SubmitCause::Candidate);
                self.reply(reply, result);
            }
        }
    }

    /// Publishes before replying so callers observe the new state.
    fn reply<T>(&self, reply: Reply<T>, result: Result<T, SessionError>) {
        self.publish();
        let _ = reply.send(result);
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.session.snapshot());
    }
}

async fn poll_acquisition(acquisition: &mut Option<AcquireFuture>) -> Result<(), CaptureError> {
    match acquisition {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}
