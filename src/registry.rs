//! Process-wide session registry.
//!
//! Maps session ids to live sessions. Each session sits behind its own
//! `tokio::sync::Mutex`, so operations on one session (notably `ask`, whose
//! history ordering depends on serialization) queue up per session while
//! distinct sessions proceed fully in parallel. The outer `RwLock` is only
//! held for map lookups, never across an await.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use crate::session::ConversationSession;

/// Shared handle to one registered session.
pub type SessionHandle = Arc<Mutex<ConversationSession>>;

/// Map from session id to session.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session and return its shared handle.
    pub fn insert(&self, session: ConversationSession) -> SessionHandle {
        let id = session.id.clone();
        let handle = Arc::new(Mutex::new(session));
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(id, handle.clone());
        }
        handle
    }

    /// Look up a session by id.
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().ok()?.get(id).cloned()
    }

    /// Remove a session. Returns `true` if it existed. Existing handles stay
    /// usable until dropped, but the id no longer resolves.
    pub fn remove(&self, id: &str) -> bool {
        self.sessions
            .write()
            .map(|mut sessions| sessions.remove(id).is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
