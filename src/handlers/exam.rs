// src/handlers/exam.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        exam::{
            CameraReportRequest, ExamResponse, ExamResultResponse, FrameRequest,
            SelectAnswerRequest, StartExamRequest, UnlockRequest, VisibilityRequest,
        },
        question::{Language, PublicQuestion},
    },
    proctor::{ExamSession, RegisteredSession, SessionRegistry, spawn_session, telemetry::TelemetryFeed},
    state::AppState,
    utils::jwt::Claims,
};

/// Lists the languages an exam can be taken in.
pub async fn list_languages() -> impl IntoResponse {
    Json(Language::ALL.to_vec())
}

/// Starts a proctored exam for the authenticated candidate.
///
/// The camera is requested immediately; the client answers through the
/// camera report endpoint. Only one unfinished session per candidate.
pub async fn start_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(active) = state.sessions.active_for(&claims.sub).await {
        return Err(AppError::Conflict(format!(
            "Exam {} is already in progress",
            active.handle.id()
        )));
    }

    let questions = state.bank.questions(payload.language).await?;
    if questions.len() != state.config.total_questions {
        tracing::warn!(
            "Question set for {} has {} questions, expected {}. Scoring uses the loaded set.",
            payload.language,
            questions.len(),
            state.config.total_questions
        );
    }

    let proctoring = &state.config.proctoring;
    let seed = proctoring.probe_seed.unwrap_or_else(rand::random);
    let session = ExamSession::start(
        claims.sub.clone(),
        payload.language,
        questions,
        proctoring,
        seed,
    );
    let public: Vec<PublicQuestion> = session
        .questions()?
        .iter()
        .map(PublicQuestion::from)
        .collect();

    let feed = Arc::new(TelemetryFeed::new(
        proctoring.frame_staleness,
        proctoring.camera_timeout,
    ));
    let handle = spawn_session(session, feed.clone(), feed.clone());
    let session_id = handle.id();
    state
        .sessions
        .insert(RegisteredSession { handle, feed })
        .await;

    tracing::info!("Candidate {} started exam {}", claims.sub, session_id);

    Ok((
        StatusCode::CREATED,
        Json(ExamResponse {
            session_id,
            language: payload.language,
            total_questions: public.len(),
            questions: public,
            expires_in: proctoring.exam_duration_secs,
        }),
    ))
}

/// Current status of a session: lock, clock, proctoring and outcome.
pub async fn get_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&sessions, id, &claims).await?;
    Ok(Json(session.handle.snapshot()))
}

/// Exam content. Refused with 423 while the session is locked.
pub async fn get_questions(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&sessions, id, &claims).await?;
    let questions = session.handle.questions().await?;
    let public: Vec<PublicQuestion> = questions.iter().map(PublicQuestion::from).collect();
    Ok(Json(public))
}

pub async fn select_answer(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let session = find_session(&sessions, id, &claims).await?;
    session
        .handle
        .select_answer(payload.question_id, payload.option)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Records whether the client obtained its camera. The first report wins.
pub async fn report_camera(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CameraReportRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let session = find_session(&sessions, id, &claims).await?;
    session
        .feed
        .report_camera(payload.status, payload.detail)
        .map_err(|e| AppError::Conflict(e.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}

/// Latest face observation from the client-side detector.
pub async fn push_frame(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FrameRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let session = find_session(&sessions, id, &claims).await?;
    session
        .feed
        .push_frame(payload.face)
        .await
        .map_err(|e| AppError::Conflict(e.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn report_visibility(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VisibilityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&sessions, id, &claims).await?;
    session.handle.report_visibility(payload.hidden).await?;
    Ok(Json(session.handle.snapshot()))
}

/// Lock screen: re-enter the user ID to resume. 403 on mismatch, retries
/// are unlimited.
pub async fn unlock(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UnlockRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let session = find_session(&sessions, id, &claims).await?;
    session.handle.unlock(payload.user_id).await?;
    Ok(Json(session.handle.snapshot()))
}

/// Submits the exam and returns the results. Repeat calls return the
/// stored outcome, including one forced by the timer.
pub async fn submit_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state.sessions, id, &claims).await?;
    let outcome = session.handle.submit().await?;

    tracing::info!(
        "Exam {} submitted by {}: {}/{}",
        id,
        claims.sub,
        outcome.score,
        outcome.total_questions
    );

    Ok(Json(ExamResultResponse::from_outcome(
        &outcome,
        state.config.passing_score,
    )))
}

async fn find_session(
    sessions: &SessionRegistry,
    id: Uuid,
    claims: &Claims,
) -> Result<RegisteredSession, AppError> {
    sessions
        .get(id, &claims.sub)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Exam session {} not found", id)))
}
