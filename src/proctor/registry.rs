// src/proctor/registry.rs

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::proctor::{runtime::SessionHandle, telemetry::TelemetryFeed};

/// A running (or finished) session and the telemetry feed bound to it.
#[derive(Debug, Clone)]
pub struct RegisteredSession {
    pub handle: SessionHandle,
    pub feed: Arc<TelemetryFeed>,
}

/// How long a finished session stays readable before it is evicted.
pub const FINISHED_RETENTION: Duration = Duration::from_secs(30 * 60);

impl RegisteredSession {
    /// True once the session finished at least `retention` ago.
    fn is_stale(&self, retention: Duration) -> bool {
        let snapshot = self.handle.snapshot();
        match snapshot.outcome {
            Some(outcome) => (Utc::now() - outcome.submitted_at)
                .to_std()
                .map(|age| age >= retention)
                .unwrap_or(retention.is_zero()),
            // Abandoned without an outcome.
            None => self.handle.is_finished(),
        }
    }
}

/// In-memory index of sessions by id. Attempts are not persisted.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, RegisteredSession>>>,
    retention: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_retention(FINISHED_RETENTION)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    /// Looks up a session owned by `identity`. Sessions of other candidates
    /// are reported as missing.
    pub async fn get(&self, id: Uuid, identity: &str) -> Option<RegisteredSession> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .filter(|s| s.handle.identity() == identity)
            .cloned()
    }

    /// Returns the unfinished session of `identity`, if any.
    pub async fn active_for(&self, identity: &str) -> Option<RegisteredSession> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .find(|s| s.handle.identity() == identity && !s.handle.is_finished())
            .cloned()
    }

    /// Registers a new session, dropping finished sessions of the same candidate.
    pub async fn insert(&self, session: RegisteredSession) {
        let mut sessions = self.sessions.write().await;
        let identity = session.handle.identity().to_string();
        sessions.retain(|_, s| !(s.handle.identity() == identity && s.handle.is_finished()));
        sessions.insert(session.handle.id(), session);
    }

    /// Evicts every session that finished longer ago than the retention.
    /// Returns the number of evicted sessions.
    pub async fn prune_finished(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_stale(self.retention));
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} finished exam sessions", evicted);
        }
        evicted
    }

    /// Spawns a background task that prunes finished sessions every `interval`.
    pub fn spawn_sweeper(&self, interval: Duration) {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.prune_finished().await;
            }
        });
    }

    pub async fn remove(&self, id: Uuid) -> Option<RegisteredSession> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
