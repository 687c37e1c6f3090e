// src/config.rs

use std::{env, str::FromStr, time::Duration};

use dotenvy::dotenv;

/// Score at or above which the results boundary reports a pass.
pub const PASSING_SCORE: u32 = 48;

/// Question count the results screen historically advertised.
pub const EXAM_TOTAL_QUESTIONS: usize = 60;

/// Timing and threshold parameters for one proctored session.
#[derive(Debug, Clone)]
pub struct ProctoringConfig {
    /// Total allotted exam time.
    pub exam_duration_secs: u32,
    pub tick_interval: Duration,
    pub poll_interval: Duration,
    pub no_face_threshold: u32,
    pub movement_threshold: f64,
    pub probe_earliest: Duration,
    pub probe_latest: Duration,
    /// Delay between a failed camera acquisition and the lock.
    pub camera_grace: Duration,
    /// How long to wait for the client to report its camera.
    pub camera_timeout: Duration,
    /// Frames older than this count as "no face".
    pub frame_staleness: Duration,
    pub recalibrate_on_resume: bool,
    /// Fixed seed for the random probe. Drawn from the OS when unset.
    pub probe_seed: Option<u64>,
}

impl Default for ProctoringConfig {
    fn default() -> Self {
        Self {
            exam_duration_secs: 60 * 60,
            tick_interval: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(200),
            no_face_threshold: 15,
            movement_threshold: 0.4,
            probe_earliest: Duration::from_millis(60 * 1000),
            probe_latest: Duration::from_millis(120 * 1000),
            camera_grace: Duration::from_millis(3000),
            camera_timeout: Duration::from_millis(30_000),
            frame_staleness: Duration::from_millis(1000),
            recalibrate_on_resume: false,
            probe_seed: None,
        }
    }
}

impl ProctoringConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            exam_duration_secs: parse_var("EXAM_DURATION_SECS", defaults.exam_duration_secs),
            tick_interval: millis_var("PROCTOR_TICK_MS", defaults.tick_interval),
            poll_interval: millis_var("PROCTOR_POLL_MS", defaults.poll_interval),
            no_face_threshold: parse_var("PROCTOR_NO_FACE_THRESHOLD", defaults.no_face_threshold),
            movement_threshold: parse_var(
                "PROCTOR_MOVEMENT_THRESHOLD",
                defaults.movement_threshold,
            ),
            probe_earliest: millis_var("PROCTOR_PROBE_MIN_MS", defaults.probe_earliest),
            probe_latest: millis_var("PROCTOR_PROBE_MAX_MS", defaults.probe_latest),
            camera_grace: millis_var("PROCTOR_CAMERA_GRACE_MS", defaults.camera_grace),
            camera_timeout: millis_var("PROCTOR_CAMERA_TIMEOUT_MS", defaults.camera_timeout),
            frame_staleness: millis_var("PROCTOR_FRAME_STALENESS_MS", defaults.frame_staleness),
            recalibrate_on_resume: parse_var(
                "PROCTOR_RECALIBRATE_ON_RESUME",
                defaults.recalibrate_on_resume,
            ),
            probe_seed: optional_var("PROCTOR_PROBE_SEED"),
        }
        .sanitized()
    }

    /// Replaces values the session cannot run with by their defaults. A zero
    /// interval would spin the session loop, a zero duration would never
    /// force a submission.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        if self.exam_duration_secs == 0 {
            tracing::warn!("Ignoring EXAM_DURATION_SECS=0");
            self.exam_duration_secs = defaults.exam_duration_secs;
        }
        if self.tick_interval.is_zero() {
            tracing::warn!("Ignoring PROCTOR_TICK_MS=0");
            self.tick_interval = defaults.tick_interval;
        }
        if self.poll_interval.is_zero() {
            tracing::warn!("Ignoring PROCTOR_POLL_MS=0");
            self.poll_interval = defaults.poll_interval;
        }
        if !(self.movement_threshold.is_finite() && self.movement_threshold > 0.0) {
            tracing::warn!(
                "Ignoring PROCTOR_MOVEMENT_THRESHOLD={}",
                self.movement_threshold
            );
            self.movement_threshold = defaults.movement_threshold;
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    /// SQLite URL of an external question bank. Built-in sets are used when unset.
    pub question_db_url: Option<String>,
    pub total_questions: usize,
    pub passing_score: u32,
    pub proctoring: ProctoringConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = parse_var("JWT_EXPIRATION", 7200);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let question_db_url = env::var("QUESTION_DB_URL").ok().filter(|v| !v.is_empty());

        Self {
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            question_db_url,
            total_questions: parse_var("EXAM_TOTAL_QUESTIONS", EXAM_TOTAL_QUESTIONS),
            passing_score: parse_var("PASSING_SCORE", PASSING_SCORE),
            proctoring: ProctoringConfig::from_env(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    optional_var(key).unwrap_or(default)
}

fn optional_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| parse_value(key, &raw))
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

fn millis_var(key: &str, default: Duration) -> Duration {
    Duration::from_millis(parse_var(key, default.as_millis() as u64))
}
