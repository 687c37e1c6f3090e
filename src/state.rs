// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, proctor::SessionRegistry, questions::QuestionBank};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionRegistry,
    pub bank: Arc<dyn QuestionBank>,
}

impl AppState {
    pub fn new(config: Config, bank: Arc<dyn QuestionBank>) -> Self {
        Self {
            config,
            sessions: SessionRegistry::new(),
            bank,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<dyn QuestionBank> {
    fn from_ref(state: &AppState) -> Self {
        state.bank.clone()
    }
}
