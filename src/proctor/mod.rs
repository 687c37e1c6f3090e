// src/proctor/mod.rs

//! Proctored exam session controller.
//!
//! `session::ExamSession` fuses the countdown, face anomaly detection,
//! visibility reports, the random probe and the camera lifecycle into one
//! lock/unlock decision. It is a plain state machine on session time;
//! `runtime` drives it from a tokio task.

pub mod clock;
pub mod detector;
pub mod device;
pub mod gate;
pub mod ledger;
pub mod probe;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod telemetry;

pub use detector::{FaceSample, Point, ProctoringStatus};
pub use gate::LockReason;
pub use registry::{RegisteredSession, SessionRegistry};
pub use runtime::{SessionHandle, spawn_session};
pub use session::{ExamOutcome, ExamSession, SessionError, SessionSnapshot, SubmitCause};
