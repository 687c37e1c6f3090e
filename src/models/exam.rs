// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::question::{Language, PublicQuestion},
    proctor::{ExamOutcome, FaceSample, SubmitCause, telemetry::CameraStatus},
};

/// DTO for candidate login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(
        length(min = 1, max = 64, message = "User ID length must be between 1 and 64 characters."),
        custom(function = validate_not_blank)
    )]
    pub user_id: String,
}

/// DTO for starting an exam.
#[derive(Debug, Deserialize)]
pub struct StartExamRequest {
    pub language: Language,
}

/// DTO for returning a started exam.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExamResponse {
    pub session_id: Uuid,
    pub language: Language,
    pub questions: Vec<PublicQuestion>,
    pub total_questions: usize,
    pub expires_in: u32, // seconds of exam time
}

/// DTO for recording an answer.
#[derive(Debug, Deserialize, Validate)]
pub struct SelectAnswerRequest {
    pub question_id: i64,
    #[validate(length(min = 1, max = 500))]
    pub option: String,
}

/// DTO for the client's camera acquisition report.
#[derive(Debug, Deserialize, Validate)]
pub struct CameraReportRequest {
    pub status: CameraStatus,
    #[validate(length(max = 500))]
    pub detail: Option<String>,
}

/// DTO for one frame of face telemetry. `face: null` means no face.
#[derive(Debug, Deserialize, Validate)]
pub struct FrameRequest {
    #[validate(custom(function = validate_face))]
    pub face: Option<FaceSample>,
}

/// DTO for a page visibility change.
#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub hidden: bool,
}

/// DTO for re-entering the identity on the lock screen.
#[derive(Debug, Deserialize, Validate)]
pub struct UnlockRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
}

/// Results presented after submission. Pass/fail is decided here, not in
/// the session.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExamResultResponse {
    pub score: u32,
    pub total_questions: usize,
    pub passing_score: u32,
    pub passed: bool,
    pub cause: SubmitCause,
    pub submitted_at: DateTime<Utc>,
    pub message: String,
}

impl ExamResultResponse {
    pub fn from_outcome(outcome: &ExamOutcome, passing_score: u32) -> Self {
        let passed = outcome.score >= passing_score;
        Self {
            score: outcome.score,
            total_questions: outcome.total_questions,
            passing_score,
            passed,
            cause: outcome.cause,
            submitted_at: outcome.submitted_at,
            message: if passed {
                "Congratulations! You Passed!".to_string()
            } else {
                format!("You need a score of {} or higher to pass.", passing_score)
            },
        }
    }
}

fn validate_not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("user_id_blank"));
    }
    Ok(())
}

fn validate_face(face: &FaceSample) -> Result<(), validator::ValidationError> {
    if !(face.anchor.x.is_finite() && face.anchor.y.is_finite() && face.width.is_finite()) {
        return Err(validator::ValidationError::new("face_not_finite"));
    }
    if face.width < 0.0 {
        return Err(validator::ValidationError::new("face_width_negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(score: u32) -> ExamOutcome {
        ExamOutcome {
            score,
            total_questions: 60,
            cause: SubmitCause::Candidate,
            remaining_secs: 0,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_pass_threshold_is_inclusive() {
        assert!(ExamResultResponse::from_outcome(&outcome(48), 48).passed);
        assert!(!ExamResultResponse::from_outcome(&outcome(47), 48).passed);
    }

    #[test]
    fn test_login_rejects_blank_id() {
        let req = LoginRequest {
            user_id: "   ".into(),
        };
        assert!(req.validate().is_err());
        let req = LoginRequest {
            user_id: "U123".into(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_frame_rejects_non_finite() {
        let req = FrameRequest {
            face: Some(FaceSample::new(f64::NAN, 0.0, 10.0)),
        };
        assert!(req.validate().is_err());
        let req = FrameRequest { face: None };
        assert!(req.validate().is_ok());
    }
}
