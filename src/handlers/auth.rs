// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config, error::AppError, models::exam::LoginRequest, utils::jwt::sign_jwt,
};

/// Authenticates a candidate and returns a JWT token.
///
/// The user ID becomes the session identity that must be re-entered to
/// unlock a locked exam.
pub async fn login(
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let token = sign_jwt(&payload.user_id, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!("Candidate logged in: {}", payload.user_id);

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user_id": payload.user_id
    })))
}
