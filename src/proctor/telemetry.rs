// src/proctor/telemetry.rs

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    sync::{Mutex, watch},
    time::Instant,
};

use crate::proctor::{
    detector::FaceSample,
    device::{CaptureDevice, CaptureError, FaceDetector},
};

/// Camera status as reported by the browser client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraReport {
    Pending,
    Ready,
    Failed(String),
    Closed,
}

/// Client-reported camera status, as received over the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    Ready,
    Failed,
}

/// Bridge between a browser that runs the landmark model and the session.
///
/// The client reports its camera once and then posts one detection per
/// frame. The session actor sees the feed as a [`CaptureDevice`] and a
/// [`FaceDetector`]: a poll returns the latest frame if it is fresh, and a
/// stale or missing frame counts as "no face".
#[derive(Debug)]
pub struct TelemetryFeed {
    camera: watch::Sender<CameraReport>,
    latest: Mutex<Option<(Instant, Option<FaceSample>)>>,
    released: AtomicBool,
    staleness: Duration,
    acquire_timeout: Duration,
}

impl TelemetryFeed {
    pub fn new(staleness: Duration, acquire_timeout: Duration) -> Self {
        let (camera, _) = watch::channel(CameraReport::Pending);
        Self {
            camera,
            latest: Mutex::new(None),
            released: AtomicBool::new(false),
            staleness,
            acquire_timeout,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Records the client's camera status. Only the first report counts.
    pub fn report_camera(&self, status: CameraStatus, detail: Option<String>) -> Result<(), CaptureError> {
        if self.is_released() {
            return Err(CaptureError::Released);
        }

        let report = match status {
            CameraStatus::Ready => CameraReport::Ready,
            CameraStatus::Failed => {
                CameraReport::Failed(detail.unwrap_or_else(|| "camera access denied".to_string()))
            }
        };
        self.camera.send_if_modified(|current| {
            if *current == CameraReport::Pending {
                *current = report;
                true
            } else {
                false
            }
        });
        Ok(())
    }

    /// Stores the detection for the newest frame (`None`: no face in frame).
    pub async fn push_frame(&self, face: Option<FaceSample>) -> Result<(), CaptureError> {
        if self.is_released() {
            return Err(CaptureError::Released);
        }
        *self.latest.lock().await = Some((Instant::now(), face));
        Ok(())
    }
}

#[async_trait]
impl FaceDetector for TelemetryFeed {
    async fn detect(&self) -> Option<FaceSample> {
        let latest = *self.latest.lock().await;
        match latest {
            Some((received, face)) if received.elapsed() <= self.staleness => face,
            _ => None,
        }
    }
}

#[async_trait]
impl CaptureDevice for TelemetryFeed {
    async fn acquire(&self) -> Result<(), CaptureError> {
        let mut rx = self.camera.subscribe();

        let wait = async {
            loop {
                let report = rx.borrow_and_update().clone();
                match report {
                    CameraReport::Ready => return Ok(()),
                    CameraReport::Failed(detail) => return Err(CaptureError::Unavailable(detail)),
                    CameraReport::Closed => return Err(CaptureError::Released),
                    CameraReport::Pending => {}
                }
                if rx.changed().await.is_err() {
                    return Err(CaptureError::Released);
                }
            }
        };

        tokio::time::timeout(self.acquire_timeout, wait)
            .await
            .unwrap_or(Err(CaptureError::TimedOut))
    }

    async fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.camera.send_replace(CameraReport::Closed);
        *self.latest.lock().await = None;
        tracing::debug!("Telemetry feed released");
    }
}
