// src/proctor/device.rs

use std::fmt;

use async_trait::async_trait;

use crate::proctor::detector::FaceSample;

/// Why the capture device could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Permission was refused or the device/model is unavailable.
    Unavailable(String),
    /// No answer from the device within the acquisition timeout.
    TimedOut,
    /// The device was released before acquisition finished.
    Released,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Unavailable(detail) => write!(f, "camera unavailable: {}", detail),
            CaptureError::TimedOut => f.write_str("camera acquisition timed out"),
            CaptureError::Released => f.write_str("camera released before acquisition"),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Face-landmark detector run against the current video frame.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Returns the anchor landmark and face width, or `None` when no face
    /// could be resolved.
    async fn detect(&self) -> Option<FaceSample>;
}

/// Camera capture stream shared by the detector and the session lifecycle.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn acquire(&self) -> Result<(), CaptureError>;

    /// Stops all underlying tracks. Must be safe without a prior successful
    /// acquisition.
    async fn release(&self);
}
