// src/proctor/detector.rs

use serde::{Deserialize, Serialize};

use crate::proctor::gate::LockReason;

/// 2-D landmark coordinate in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A single detector result: a stable anchor landmark (top of the nose
/// bridge) and the width of the face bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceSample {
    pub anchor: Point,
    pub width: f64,
}

impl FaceSample {
    pub fn new(x: f64, y: f64, width: f64) -> Self {
        Self {
            anchor: Point::new(x, y),
            width,
        }
    }

    fn has_usable_width(&self) -> bool {
        self.width.is_finite() && self.width > 0.0
    }
}

/// Zero-displacement reference captured on the first successful detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baseline {
    pub anchor: Point,
    pub width: f64,
}

/// Display-only proctoring status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProctoringStatus {
    Initializing,
    Calibrating,
    Active,
    NoFaceWarning,
    Error,
}

/// Thresholds applied to detector results.
#[derive(Debug, Clone, Copy)]
pub struct DetectorThresholds {
    /// Consecutive misses tolerated; one more locks the exam.
    pub max_consecutive_misses: u32,
    /// Normalized displacement tolerated; anything strictly above locks.
    pub max_normalized_displacement: f64,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            max_consecutive_misses: 15,
            max_normalized_displacement: 0.4,
        }
    }
}

/// What a single poll produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    Calibrated(Baseline),
    Steady { displacement: f64 },
    Missed { consecutive: u32 },
    Anomaly(LockReason),
}

/// Tracks face presence and head displacement across polls.
#[derive(Debug)]
pub struct FaceAnomalyDetector {
    thresholds: DetectorThresholds,
    baseline: Option<Baseline>,
    consecutive_misses: u32,
    status: ProctoringStatus,
    armed: bool,
}

impl FaceAnomalyDetector {
    pub fn new(thresholds: DetectorThresholds) -> Self {
        Self {
            thresholds,
            baseline: None,
            consecutive_misses: 0,
            status: ProctoringStatus::Initializing,
            armed: false,
        }
    }

    /// Camera is live; polling may begin.
    pub fn arm(&mut self) {
        self.armed = true;
        if self.baseline.is_none() {
            self.status = ProctoringStatus::Calibrating;
        }
    }

    /// Camera or model could not be acquired.
    pub fn fail(&mut self) {
        self.armed = false;
        self.status = ProctoringStatus::Error;
    }

    /// Stops polling until re-armed.
    pub fn suspend(&mut self) {
        self.armed = false;
    }

    /// Re-arms after an unlock. Baseline and miss counter are kept unless
    /// `recalibrate` is set.
    pub fn resume(&mut self, recalibrate: bool) {
        if self.status == ProctoringStatus::Error || self.status == ProctoringStatus::Initializing
        {
            return;
        }
        if recalibrate {
            self.baseline = None;
            self.consecutive_misses = 0;
            self.status = ProctoringStatus::Calibrating;
        }
        self.armed = true;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn status(&self) -> ProctoringStatus {
        self.status
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.baseline
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    /// Feeds one poll result into the detector.
    ///
    /// An anomaly disarms the detector; the caller forwards the reason to the
    /// lock gate.
    pub fn observe(&mut self, sample: Option<FaceSample>) -> Observation {
        let sample = sample.filter(|s| self.baseline.is_some() || s.has_usable_width());

        let Some(sample) = sample else {
            self.consecutive_misses += 1;
            if self.consecutive_misses > self.thresholds.max_consecutive_misses {
                self.armed = false;
                return Observation::Anomaly(LockReason::FaceNotDetected);
            }
            self.status = ProctoringStatus::NoFaceWarning;
            return Observation::Missed {
                consecutive: self.consecutive_misses,
            };
        };

        self.consecutive_misses = 0;

        let Some(baseline) = self.baseline else {
            let baseline = Baseline {
                anchor: sample.anchor,
                width: sample.width,
            };
            self.baseline = Some(baseline);
            self.status = ProctoringStatus::Active;
            return Observation::Calibrated(baseline);
        };

        // Normalizing by face width keeps the threshold a fraction of head
        // size whatever the distance to the camera.
        let displacement = sample.anchor.distance(&baseline.anchor) / baseline.width;
        if displacement > self.thresholds.max_normalized_displacement {
            self.armed = false;
            return Observation::Anomaly(LockReason::ExcessiveMovement);
        }

        self.status = ProctoringStatus::Active;
        Observation::Steady { displacement }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed() -> FaceAnomalyDetector {
        let mut detector = FaceAnomalyDetector::new(DetectorThresholds::default());
        detector.arm();
        detector
    }

    #[test]
    fn test_first_detection_calibrates() {
        let mut detector = armed();
        assert_eq!(detector.status(), ProctoringStatus::Calibrating);

        let obs = detector.observe(Some(FaceSample::new(100.0, 100.0, 200.0)));
        assert!(matches!(obs, Observation::Calibrated(_)));
        assert_eq!(detector.status(), ProctoringStatus::Active);
        assert_eq!(detector.baseline().unwrap().width, 200.0);
    }

    #[test]
    fn test_large_first_sample_does_not_lock() {
        let mut detector = armed();
        let obs = detector.observe(Some(FaceSample::new(9000.0, -400.0, 10.0)));
        assert!(matches!(obs, Observation::Calibrated(_)));
        assert!(detector.is_armed());
    }

    #[test]
    fn test_displacement_sequence_locks_on_third_sample() {
        let mut detector = armed();
        detector.observe(Some(FaceSample::new(0.0, 0.0, 100.0)));

        // Normalized displacements 0.1, 0.15, 0.5 against a width of 100.
        let first = detector.observe(Some(FaceSample::new(10.0, 0.0, 100.0)));
        assert!(matches!(first, Observation::Steady { .. }));
        let second = detector.observe(Some(FaceSample::new(0.0, 15.0, 100.0)));
        assert!(matches!(second, Observation::Steady { .. }));
        let third = detector.observe(Some(FaceSample::new(30.0, 40.0, 100.0)));
        assert_eq!(third, Observation::Anomaly(LockReason::ExcessiveMovement));
        assert!(!detector.is_armed());
    }

    #[test]
    fn test_displacement_at_threshold_is_tolerated() {
        let mut detector = armed();
        detector.observe(Some(FaceSample::new(0.0, 0.0, 100.0)));
        let obs = detector.observe(Some(FaceSample::new(40.0, 0.0, 100.0)));
        assert!(matches!(obs, Observation::Steady { .. }));
    }

    #[test]
    fn test_displacement_is_normalized_by_baseline_width() {
        let mut detector = armed();
        detector.observe(Some(FaceSample::new(0.0, 0.0, 400.0)));
        // 120px is 0.3 of a 400px face.
        let obs = detector.observe(Some(FaceSample::new(120.0, 0.0, 50.0)));
        assert!(matches!(obs, Observation::Steady { displacement } if (displacement - 0.3).abs() < 1e-9));
    }

    #[test]
    fn test_sixteenth_miss_locks() {
        let mut detector = armed();
        for i in 1..=15 {
            assert_eq!(
                detector.observe(None),
                Observation::Missed { consecutive: i }
            );
            assert_eq!(detector.status(), ProctoringStatus::NoFaceWarning);
        }
        assert_eq!(
            detector.observe(None),
            Observation::Anomaly(LockReason::FaceNotDetected)
        );
    }

    #[test]
    fn test_detection_resets_miss_counter() {
        let mut detector = armed();
        detector.observe(Some(FaceSample::new(0.0, 0.0, 100.0)));
        for _ in 0..10 {
            detector.observe(None);
        }
        detector.observe(Some(FaceSample::new(1.0, 1.0, 100.0)));
        assert_eq!(detector.consecutive_misses(), 0);
        assert_eq!(detector.status(), ProctoringStatus::Active);
    }

    #[test]
    fn test_zero_width_cannot_calibrate() {
        let mut detector = armed();
        let obs = detector.observe(Some(FaceSample::new(10.0, 10.0, 0.0)));
        assert_eq!(obs, Observation::Missed { consecutive: 1 });
        assert!(detector.baseline().is_none());
    }

    #[test]
    fn test_resume_keeps_baseline_by_default() {
        let mut detector = armed();
        detector.observe(Some(FaceSample::new(0.0, 0.0, 100.0)));
        detector.observe(Some(FaceSample::new(90.0, 0.0, 100.0)));
        assert!(!detector.is_armed());

        detector.resume(false);
        assert!(detector.is_armed());
        assert_eq!(detector.baseline().unwrap().anchor, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_resume_with_recalibration() {
        let mut detector = armed();
        detector.observe(Some(FaceSample::new(0.0, 0.0, 100.0)));
        detector.suspend();

        detector.resume(true);
        assert!(detector.baseline().is_none());
        assert_eq!(detector.status(), ProctoringStatus::Calibrating);
    }

    #[test]
    fn test_failed_camera_stays_idle_on_resume() {
        let mut detector = FaceAnomalyDetector::new(DetectorThresholds::default());
        detector.fail();
        detector.resume(false);
        assert!(!detector.is_armed());
        assert_eq!(detector.status(), ProctoringStatus::Error);
    }
}
