//! Per-user tour sessions.
//!
//! Sessions are keyed by LINE user id and hold the user's current [`Stage`].
//! Kept in memory only; a restart sends everyone back to the start.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::dialogue::Stage;

/// Platform user id (LINE `source.userId`).
pub type UserId = String;

/// Where one user is in the tour.
#[derive(Debug, Clone)]
pub struct TourSession {
    pub user_id: UserId,
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Text messages handled for this user since the session started.
    pub turns: u32,
}

impl TourSession {
    fn new(user_id: UserId, stage: Stage) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            stage,
            started_at: now,
            updated_at: now,
            turns: 0,
        }
    }
}

/// In-memory store for sessions (create, read, update under one lock).
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<UserId, TourSession>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return a clone of the session if it exists.
    pub async fn get(&self, user_id: &str) -> Option<TourSession> {
        self.inner.read().await.get(user_id).cloned()
    }

    /// Run `f` on the user's session (created at [`Stage::Start`] if missing) while holding the write lock.
    pub async fn update<R>(&self, user_id: &str, f: impl FnOnce(&mut TourSession) -> R) -> R {
        let mut g = self.inner.write().await;
        let session = g
            .entry(user_id.to_string())
            .or_insert_with(|| TourSession::new(user_id.to_string(), Stage::Start));
        let out = f(&mut *session);
        session.updated_at = Utc::now();
        out
    }

    /// Like [`update`](Self::update), but a user without a session is run against a fresh
    /// one at [`Stage::Start`] that is only stored when `f` returns `true`.
    pub async fn update_or_start<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut TourSession) -> (bool, R),
    ) -> R {
        let mut g = self.inner.write().await;
        if let Some(session) = g.get_mut(user_id) {
            let (_, out) = f(&mut *session);
            session.updated_at = Utc::now();
            return out;
        }
        let mut session = TourSession::new(user_id.to_string(), Stage::Start);
        let (keep, out) = f(&mut session);
        if keep {
            g.insert(user_id.to_string(), session);
        }
        out
    }

    /// Move the user to `stage`, creating the session if needed.
    pub async fn advance(&self, user_id: &str, stage: Stage) {
        self.update(user_id, |s| s.stage = stage).await
    }

    /// Replace the user's session with a fresh one at `stage`.
    pub async fn reset(&self, user_id: &str, stage: Stage) -> TourSession {
        let session = TourSession::new(user_id.to_string(), stage);
        self.inner
            .write()
            .await
            .insert(user_id.to_string(), session.clone());
        session
    }

    pub async fn remove(&self, user_id: &str) -> Option<TourSession> {
        self.inner.write().await.remove(user_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
