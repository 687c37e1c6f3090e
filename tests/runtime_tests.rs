// tests/runtime_tests.rs
//
// Session actor tests on tokio's paused clock.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use proctor_backend::{
    config::ProctoringConfig,
    models::question::{Language, Question},
    proctor::{
        ExamSession, FaceSample, LockReason, ProctoringStatus, SessionError, SubmitCause,
        device::{CaptureDevice, CaptureError, FaceDetector},
        session::CameraState,
        spawn_session,
        telemetry::{CameraStatus, TelemetryFeed},
    },
};
use tokio::time::sleep;

const USER: &str = "U123";

/// Always sees the same face in the same place.
struct SteadyFace;

#[async_trait]
impl FaceDetector for SteadyFace {
    async fn detect(&self) -> Option<FaceSample> {
        Some(FaceSample::new(320.0, 240.0, 120.0))
    }
}

/// Camera with a fixed acquisition result that counts releases.
struct FakeCamera {
    failure: Option<String>,
    releases: AtomicUsize,
}

impl FakeCamera {
    fn ready() -> Arc<Self> {
        Arc::new(Self {
            failure: None,
            releases: AtomicUsize::new(0),
        })
    }

    fn denied() -> Arc<Self> {
        Arc::new(Self {
            failure: Some("Permission denied".into()),
            releases: AtomicUsize::new(0),
        })
    }

    fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for FakeCamera {
    async fn acquire(&self) -> Result<(), CaptureError> {
        match &self.failure {
            Some(detail) => Err(CaptureError::Unavailable(detail.clone())),
            None => Ok(()),
        }
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn secs(v: u64) -> Duration {
    Duration::from_secs(v)
}

fn questions() -> Vec<Question> {
    (1..=4)
        .map(|id| Question {
            id,
            question: format!("Question {}", id),
            options: vec!["A".into(), "B".into()],
            answer: "A".into(),
            image: None,
        })
        .collect()
}

fn session(duration_secs: u32) -> ExamSession {
    let config = ProctoringConfig {
        exam_duration_secs: duration_secs,
        probe_earliest: secs(5 * 60 * 60),
        probe_latest: secs(5 * 60 * 60),
        ..ProctoringConfig::default()
    };
    ExamSession::start(USER, Language::English, questions(), &config, 3)
}

#[tokio::test(start_paused = true)]
async fn test_expiry_submits_and_releases_camera_once() {
    let camera = FakeCamera::ready();
    let handle = spawn_session(session(3), Arc::new(SteadyFace), camera.clone());

    handle.select_answer(1, "A".into()).await.unwrap();
    handle.select_answer(2, "B".into()).await.unwrap();

    let outcome = handle.finished().await.expect("timer should submit");
    assert_eq!(outcome.cause, SubmitCause::TimeExpired);
    assert_eq!(outcome.score, 1);
    assert_eq!(outcome.remaining_secs, 0);

    sleep(ms(50)).await;
    assert!(handle.is_finished());
    assert_eq!(camera.releases(), 1);

    // Late submissions and reads still see the forced result.
    assert_eq!(handle.submit().await, Ok(outcome.clone()));
    assert_eq!(handle.snapshot().outcome, Some(outcome));
    assert_eq!(
        handle.select_answer(3, "A".into()).await,
        Err(SessionError::Submitted)
    );
    assert_eq!(camera.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_candidate_submit_releases_camera() {
    let camera = FakeCamera::ready();
    let handle = spawn_session(session(3600), Arc::new(SteadyFace), camera.clone());

    sleep(ms(1500)).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.camera, CameraState::Acquired);
    assert_eq!(snapshot.proctoring_status, ProctoringStatus::Active);

    let outcome = handle.submit().await.unwrap();
    assert_eq!(outcome.cause, SubmitCause::Candidate);

    sleep(ms(50)).await;
    assert_eq!(camera.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_lock_freezes_remaining_time() {
    let handle = spawn_session(session(3600), Arc::new(SteadyFace), FakeCamera::ready());

    sleep(ms(10_500)).await;
    handle.report_visibility(true).await.unwrap();

    let locked = handle.snapshot();
    assert!(locked.locked);
    assert_eq!(locked.lock_reason.as_deref(), Some("Tabbed out of the exam."));
    assert_eq!(locked.clock.remaining_secs, 3590);
    assert_eq!(handle.questions().await, Err(SessionError::Locked));

    sleep(secs(3600)).await;
    assert_eq!(handle.snapshot().clock.remaining_secs, 3590);

    assert_eq!(
        handle.unlock("wrong".into()).await,
        Err(SessionError::IdentityMismatch)
    );
    handle.unlock(USER.into()).await.unwrap();
    assert!(!handle.snapshot().locked);

    sleep(ms(5_500)).await;
    assert_eq!(handle.snapshot().clock.remaining_secs, 3585);
    assert_eq!(handle.questions().await.map(|q| q.len()), Ok(4));
}

#[tokio::test(start_paused = true)]
async fn test_camera_failure_locks_after_grace() {
    let camera = FakeCamera::denied();
    let handle = spawn_session(session(3600), Arc::new(SteadyFace), camera.clone());

    sleep(ms(2_900)).await;
    let snapshot = handle.snapshot();
    assert!(!snapshot.locked);
    assert_eq!(snapshot.camera, CameraState::Failed);
    assert_eq!(snapshot.proctoring_status, ProctoringStatus::Error);

    sleep(ms(200)).await;
    assert_eq!(
        handle.snapshot().lock_code,
        Some(LockReason::CameraUnavailable)
    );

    handle.unlock(USER.into()).await.unwrap();
    handle.submit().await.unwrap();
    sleep(ms(50)).await;
    assert_eq!(camera.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_releases_feed() {
    let feed = Arc::new(TelemetryFeed::new(secs(1), secs(30)));
    let handle = spawn_session(session(3600), feed.clone(), feed.clone());

    sleep(ms(500)).await;
    drop(handle);
    sleep(ms(50)).await;

    assert!(feed.is_released());
    assert_eq!(
        feed.push_frame(None).await,
        Err(CaptureError::Released)
    );
}

#[tokio::test(start_paused = true)]
async fn test_telemetry_feed_drives_movement_lock() {
    let feed = Arc::new(TelemetryFeed::new(secs(1), secs(30)));
    let handle = spawn_session(session(3600), feed.clone(), feed.clone());

    feed.report_camera(CameraStatus::Ready, None).unwrap();
    feed.push_frame(Some(FaceSample::new(100.0, 100.0, 100.0)))
        .await
        .unwrap();
    sleep(ms(300)).await;
    assert_eq!(handle.snapshot().proctoring_status, ProctoringStatus::Active);

    feed.push_frame(Some(FaceSample::new(160.0, 100.0, 100.0)))
        .await
        .unwrap();
    sleep(ms(300)).await;
    assert_eq!(
        handle.snapshot().lock_code,
        Some(LockReason::ExcessiveMovement)
    );
}

#[tokio::test(start_paused = true)]
async fn test_silent_feed_locks_for_missing_face() {
    let feed = Arc::new(TelemetryFeed::new(secs(1), secs(30)));
    let handle = spawn_session(session(3600), feed.clone(), feed.clone());

    feed.report_camera(CameraStatus::Ready, None).unwrap();
    feed.push_frame(Some(FaceSample::new(100.0, 100.0, 100.0)))
        .await
        .unwrap();
    sleep(ms(300)).await;
    assert_eq!(handle.snapshot().proctoring_status, ProctoringStatus::Active);

    // The last frame goes stale after a second; sixteen empty polls follow.
    sleep(secs(5)).await;
    assert_eq!(
        handle.snapshot().lock_code,
        Some(LockReason::FaceNotDetected)
    );
}
