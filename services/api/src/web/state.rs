//! services/api/src/web/state.rs
//!
//! Defines the application's shared state: the service ports, the in-flight
//! generation guard, and the registry of active flashcard study sessions.

use crate::config::Config;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use study_assistant_core::ports::{DatabaseService, MailService, PortError, PortResult};
use study_assistant_core::study::FlashcardStudy;
use study_assistant_core::StudyMaterialGenerator;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub generator: Arc<StudyMaterialGenerator>,
    pub mailer: Arc<dyn MailService>,
    pub in_flight: GenerationGuard,
    pub study_sessions: StudySessionRegistry,
}

impl AppState {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        config: Arc<Config>,
        generator: Arc<StudyMaterialGenerator>,
        mailer: Arc<dyn MailService>,
    ) -> Self {
        Self {
            db,
            config,
            generator,
            mailer,
            in_flight: GenerationGuard::default(),
            study_sessions: StudySessionRegistry::default(),
        }
    }
}

//=========================================================================================
// GenerationGuard
//=========================================================================================

/// Tracks documents whose study materials are currently being generated.
#[derive(Clone, Default)]
pub struct GenerationGuard {
    documents: Arc<Mutex<HashSet<Uuid>>>,
}

/// Held for the duration of one generation run. Dropping it releases the document.
pub struct InFlightPermit {
    documents: Arc<Mutex<HashSet<Uuid>>>,
    document_id: Uuid,
}

impl GenerationGuard {
    /// Claims `document_id`, failing with `Conflict` while another run holds it.
    pub fn try_acquire(&self, document_id: Uuid) -> PortResult<InFlightPermit> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| PortError::Unexpected("generation guard poisoned".to_string()))?;
        if !documents.insert(document_id) {
            return Err(PortError::Conflict(format!(
                "Study materials for document {} are already being generated",
                document_id
            )));
        }
        Ok(InFlightPermit {
            documents: self.documents.clone(),
            document_id,
        })
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        if let Ok(mut documents) = self.documents.lock() {
            documents.remove(&self.document_id);
        }
    }
}

//=========================================================================================
// StudySessionRegistry
//=========================================================================================

/// One user's pass through the flashcards of a document.
pub struct StudySession {
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub document_title: String,
    pub study: FlashcardStudy,
}

/// Sessions untouched for this long are dropped the next time one is started.
pub const STUDY_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

struct RegisteredSession {
    session: StudySession,
    last_used: Instant,
}

/// In-memory study sessions. A user holds at most one session per document.
#[derive(Clone)]
pub struct StudySessionRegistry {
    sessions: Arc<AsyncMutex<HashMap<Uuid, RegisteredSession>>>,
    idle_timeout: Duration,
}

impl Default for StudySessionRegistry {
    fn default() -> Self {
        Self::with_idle_timeout(STUDY_SESSION_IDLE_TIMEOUT)
    }
}

impl StudySessionRegistry {
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            idle_timeout,
        }
    }

    /// Stores a new session and returns its id. Any earlier session of the same
    /// user on the same document is replaced, and idle sessions are swept.
    pub async fn insert(&self, session: StudySession) -> Uuid {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, held| {
            let same_deck = held.session.user_id == session.user_id
                && held.session.document_id == session.document_id;
            !same_deck && now.duration_since(held.last_used) < self.idle_timeout
        });
        let dropped = before - sessions.len();
        if dropped > 0 {
            debug!(dropped, "Study sessions replaced or expired.");
        }

        let session_id = Uuid::new_v4();
        sessions.insert(
            session_id,
            RegisteredSession {
                session,
                last_used: now,
            },
        );
        session_id
    }

    /// Runs `f` against a session owned by `user_id`. Sessions belonging to other
    /// users, and sessions idle past the timeout, are reported as missing.
    pub async fn with_session<T>(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        f: impl FnOnce(&mut StudySession) -> T,
    ) -> PortResult<T> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&session_id) {
            Some(held)
                if held.session.user_id == user_id
                    && now.duration_since(held.last_used) < self.idle_timeout =>
            {
                held.last_used = now;
                Ok(f(&mut held.session))
            }
            _ => Err(PortError::NotFound(format!(
                "Study session {} not found",
                session_id
            ))),
        }
    }

    /// Drops every session studying `document_id`.
    pub async fn remove_for_document(&self, document_id: Uuid) {
        self.sessions
            .lock()
            .await
            .retain(|_, held| held.session.document_id != document_id);
    }

    /// Drops every session belonging to `user_id`.
    pub async fn remove_for_user(&self, user_id: Uuid) {
        self.sessions
            .lock()
            .await
            .retain(|_, held| held.session.user_id != user_id);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
