//! In-memory session store.
//!
//! Every session sits behind its own `tokio::sync::Mutex`. Holding the lock
//! is what "awaiting a response" means: [`SessionStore::checkout`] never
//! waits, so a second message for a busy session is refused instead of
//! queued. Nothing here survives a restart.

use askdesk_core::{ChatSession, SessionId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::error::SessionError;

/// Bookkeeping readable without locking the session; drives eviction.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub turns: usize,
}

struct SessionEntry {
    session: Arc<Mutex<ChatSession>>,
    summary: Arc<std::sync::Mutex<SessionSummary>>,
}

impl SessionEntry {
    fn summary(&self) -> Option<SessionSummary> {
        self.summary.lock().ok().map(|s| s.clone())
    }

    fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }
}

/// Exclusive access to one session. Refreshes the summary on drop.
pub struct SessionGuard {
    session: OwnedMutexGuard<ChatSession>,
    summary: Arc<std::sync::Mutex<SessionSummary>>,
}

impl Deref for SessionGuard {
    type Target = ChatSession;

    fn deref(&self) -> &ChatSession {
        &self.session
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut ChatSession {
        &mut self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Ok(mut summary) = self.summary.lock() {
            summary.turns = self.session.len();
            summary.updated_at = self.session.updated_at;
        }
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Start a new, empty session, evicting the least recently updated idle
    /// session if the store is full.
    pub async fn create(&self) -> SessionSummary {
        let session = ChatSession::new();
        let summary = SessionSummary {
            id: session.id.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            turns: 0,
        };

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            Self::evict_oldest_idle(&mut sessions);
        }
        sessions.insert(
            session.id.clone(),
            SessionEntry {
                session: Arc::new(Mutex::new(session)),
                summary: Arc::new(std::sync::Mutex::new(summary.clone())),
            },
        );

        debug!(session_id = %summary.id, total = sessions.len(), "Session created");
        summary
    }

    fn evict_oldest_idle(sessions: &mut HashMap<SessionId, SessionEntry>) {
        let oldest = sessions
            .iter()
            .filter(|(_, entry)| !entry.is_busy())
            .filter_map(|(id, entry)| entry.summary().map(|s| (id.clone(), s.updated_at)))
            .min_by_key(|(_, updated_at)| *updated_at)
            .map(|(id, _)| id);

        if let Some(id) = oldest {
            sessions.remove(&id);
            info!(session_id = %id, "Session store full, evicted least recently used session");
        }
    }

    /// Take exclusive access to a session without waiting.
    ///
    /// Fails with `Busy` while another message for the same session is
    /// still awaiting its reply.
    pub async fn checkout(&self, id: &SessionId) -> Result<SessionGuard, SessionError> {
        let sessions = self.sessions.read().await;
        let entry = sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;

        let session = entry
            .session
            .clone()
            .try_lock_owned()
            .map_err(|_| SessionError::Busy(id.clone()))?;

        Ok(SessionGuard {
            session,
            summary: entry.summary.clone(),
        })
    }

    /// A copy of the full transcript, for replay.
    ///
    /// Waits for an in-flight message to finish so the copy is consistent.
    pub async fn snapshot(&self, id: &SessionId) -> Result<ChatSession, SessionError> {
        let session = {
            let sessions = self.sessions.read().await;
            sessions
                .get(id)
                .map(|entry| entry.session.clone())
                .ok_or_else(|| SessionError::NotFound(id.clone()))?
        };
        let transcript = session.lock().await.clone();
        Ok(transcript)
    }

    /// End a session. Returns whether it existed.
    pub async fn end(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            debug!(session_id = %id, "Session ended");
        }
        removed
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
