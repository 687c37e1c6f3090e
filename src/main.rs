// src/main.rs

use std::{sync::Arc, time::Duration};

use dotenvy::dotenv;
use proctor_backend::{
    config::Config,
    error::AppError,
    questions::{QuestionBank, SqlQuestionBank, StaticQuestionBank},
    routes,
    state::AppState,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let bank = load_question_bank(&config)
        .await
        .expect("Failed to load the question bank");

    let state = AppState::new(config.clone(), bank);
    // Finished sessions stay readable for a while, then get evicted.
    state.sessions.spawn_sweeper(Duration::from_secs(60));
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listening address");
    tracing::info!("Proctor backend listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}

/// External SQLite bank when `QUESTION_DB_URL` is set, built-in sets otherwise.
async fn load_question_bank(config: &Config) -> Result<Arc<dyn QuestionBank>, AppError> {
    match &config.question_db_url {
        Some(url) => {
            tracing::info!("Loading questions from {}", url);
            let bank = SqlQuestionBank::connect(url).await?;
            tracing::info!("Question bank migrations applied successfully.");
            Ok(Arc::new(bank))
        }
        None => {
            tracing::info!("Using built-in question sets");
            Ok(Arc::new(StaticQuestionBank::builtin()?))
        }
    }
}
