// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, exam},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Public: login and the language list.
/// * Protected: everything under `/api/exam/sessions`, scoped to the
///   candidate in the token.
/// * Global middleware (Trace, CORS) and shared state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let session_routes = Router::new()
        .route("/sessions", post(exam::start_exam))
        .route("/sessions/{id}", get(exam::get_session))
        .route("/sessions/{id}/questions", get(exam::get_questions))
        .route("/sessions/{id}/answers", put(exam::select_answer))
        .route("/sessions/{id}/camera", post(exam::report_camera))
        .route("/sessions/{id}/frames", post(exam::push_frame))
        .route("/sessions/{id}/visibility", post(exam::report_visibility))
        .route("/sessions/{id}/unlock", post(exam::unlock))
        .route("/sessions/{id}/submit", post(exam::submit_exam))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let exam_routes = Router::new()
        .route("/languages", get(exam::list_languages))
        .merge(session_routes);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/exam", exam_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
