//! SessionManager - the registry of live sessions.

use super::state::{Session, SessionId};
use crate::connection::{Connection, ConnectionId};
use crate::protocol::ClientId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No client for id {0}")]
    NoSuchClient(ClientId),

    #[error("Failed to generate session id: {0}")]
    IdGeneration(String),

    #[error("Expected non-empty session id")]
    MissingSessionId,

    #[error("Expected non-empty client name")]
    MissingName,
}

/// Point-in-time registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    pub sessions: usize,
    pub connections: usize,
}

/// Tracks every live session. Sessions are created on first reference and
/// removed as soon as their last connection leaves.
///
/// Built once at startup and shared as `Arc<SessionManager>`. When both the
/// registry lock and a session lock are needed, the registry lock is taken
/// first.
#[derive(Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Produce an unguessable id for a new session.
    pub fn generate_session_id(&self) -> Result<SessionId, SessionError> {
        loop {
            let id = SessionId::generate()?;
            if !self.lock().contains_key(&id) {
                return Ok(id);
            }
        }
    }

    /// Get the session for `id`, creating an empty one if none exists.
    pub fn get_or_create(&self, id: &SessionId) -> Arc<Session> {
        let mut sessions = self.lock();
        Self::get_or_insert(&mut sessions, id)
    }

    fn get_or_insert(sessions: &mut HashMap<SessionId, Arc<Session>>, id: &SessionId) -> Arc<Session> {
        Arc::clone(sessions.entry(id.clone()).or_insert_with(|| {
            log::debug!("Creating session {}", id);
            Arc::new(Session::new(id.clone()))
        }))
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.lock().get(id).cloned()
    }

    /// Attach `connection` to the session `id`, creating the session if needed.
    ///
    /// Lookup and attach happen under the registry lock, so a join can never
    /// land on a session that a concurrent [`drop_connection`] is removing.
    ///
    /// [`drop_connection`]: SessionManager::drop_connection
    pub fn join(&self, id: &SessionId, connection: Connection, name: &str) -> (Arc<Session>, ClientId) {
        let mut sessions = self.lock();
        let session = Self::get_or_insert(&mut sessions, id);
        let client_id = session.attach(connection, name);
        (session, client_id)
    }

    /// Detach a connection from session `id`. Removes the session once it has
    /// no connections left. Returns `true` if the session was removed.
    pub fn drop_connection(&self, id: &SessionId, connection_id: ConnectionId) -> bool {
        let mut sessions = self.lock();
        let Some(session) = sessions.get(id) else {
            return false;
        };
        if session.detach(connection_id) == 0 {
            sessions.remove(id);
            log::debug!("Session {} is empty, removing", id);
            return true;
        }
        false
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    pub fn stats(&self) -> ManagerStats {
        let sessions = self.lock();
        ManagerStats {
            sessions: sessions.len(),
            connections: sessions.values().map(|s| s.connection_count()).sum(),
        }
    }
}
