//! Per-session state.

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use uuid::Uuid;

use super::manager::SessionError;
use crate::connection::{Connection, ConnectionId, DeliveryError, Frame};
use crate::protocol::{ClientId, ClientState, SessionState, Value, BID_KEY, DID_BID_KEY, NAME_KEY};

/// Unique identifier for a session. Doubles as its access token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// 128 bits from the OS random source, hex encoded.
    pub fn generate() -> Result<Self, SessionError> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| SessionError::IdGeneration(e.to_string()))?;
        Ok(Self(Uuid::from_bytes(bytes).simple().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Attachment {
    client_id: ClientId,
    connection: Connection,
}

struct SessionInner {
    /// The data every client sees. Broadcast verbatim.
    state: SessionState,
    /// Attached connections and the client each one speaks for.
    connections: HashMap<ConnectionId, Attachment>,
    /// Last client-driven change, for idle cutoff.
    last_activity: Instant,
}

impl SessionInner {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn fresh_client_id(&self) -> ClientId {
        loop {
            let id = ClientId(rand::random());
            if !self.state.clients.contains_key(&id) {
                return id;
            }
        }
    }
}

fn seeded_client(name: &str) -> ClientState {
    let mut client = ClientState::new();
    client.insert(NAME_KEY.to_string(), Value::from(name));
    client.insert(BID_KEY.to_string(), Value::Integer(0));
    client.insert(DID_BID_KEY.to_string(), Value::Bool(false));
    client
}

/// The shared state of a group of clients plus the connections to reach them.
///
/// Every operation takes the session lock for its whole duration. The lock is
/// never held across an await point; broadcasts queue frames without blocking.
pub struct Session {
    id: SessionId,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            inner: Mutex::new(SessionInner {
                state: SessionState::new(),
                connections: HashMap::new(),
                last_activity: Instant::now(),
            }),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a client named `name`, reachable through `connection`.
    ///
    /// The assigned id is queued as the connection's first frame while the
    /// lock is held, so it always precedes the first snapshot.
    pub fn attach(&self, connection: Connection, name: &str) -> ClientId {
        let mut inner = self.lock();

        if let Some(previous) = inner.connections.remove(&connection.id()) {
            inner.state.clients.remove(&previous.client_id);
        }

        let client_id = inner.fresh_client_id();
        inner.state.clients.insert(client_id, seeded_client(name));

        if let Err(e) = connection.deliver(Frame::Text(Arc::from(client_id.to_string()))) {
            log::warn!(
                "Failed to queue client id {} for session {}: {}",
                client_id,
                self.id,
                e
            );
        }

        inner.connections.insert(
            connection.id(),
            Attachment {
                client_id,
                connection,
            },
        );
        inner.touch();
        client_id
    }

    /// Remove a connection and its client state. Returns how many connections
    /// remain. Detaching an unknown connection changes nothing.
    pub fn detach(&self, connection_id: ConnectionId) -> usize {
        let mut inner = self.lock();
        if let Some(attachment) = inner.connections.remove(&connection_id) {
            inner.state.clients.remove(&attachment.client_id);
        }
        inner.connections.len()
    }

    /// Set `world[key] = value`.
    pub fn update_world(&self, key: impl Into<String>, value: impl Into<Value>) {
        let mut inner = self.lock();
        inner.state.world.insert(key.into(), value.into());
        inner.touch();
    }

    /// Set `clients[client_id][key] = value`.
    pub fn update_user(
        &self,
        client_id: ClientId,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), SessionError> {
        let mut inner = self.lock();
        let client = inner
            .state
            .clients
            .get_mut(&client_id)
            .ok_or(SessionError::NoSuchClient(client_id))?;
        client.insert(key.into(), value.into());
        inner.touch();
        Ok(())
    }

    /// Clear the world and every client field except `name`.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state.world.clear();
        for client in inner.state.clients.values_mut() {
            let name = client.remove(NAME_KEY);
            client.clear();
            if let Some(name) = name {
                client.insert(NAME_KEY.to_string(), name);
            }
        }
        inner.touch();
    }

    /// Send the full current state to every attached connection.
    ///
    /// Each connection is tried independently; failures are logged and do not
    /// detach anyone. A backlogged connection keeps this snapshot as its
    /// latest and gets it once its queue drains. Returns the number of
    /// connections the snapshot was queued for directly.
    pub fn broadcast(&self) -> usize {
        let inner = self.lock();
        if inner.connections.is_empty() {
            return 0;
        }

        let json: Arc<str> = match inner.state.encode() {
            Ok(j) => Arc::from(j),
            Err(e) => {
                log::error!("Failed to serialize state for session {}: {}", self.id, e);
                return 0;
            }
        };

        let mut delivered = 0;
        for attachment in inner.connections.values() {
            match attachment.connection.deliver_snapshot(Arc::clone(&json)) {
                Ok(()) => delivered += 1,
                Err(DeliveryError::Backlogged) => log::debug!(
                    "Client {} in session {} is backlogged, holding latest state",
                    attachment.client_id,
                    self.id
                ),
                Err(e) => log::warn!(
                    "Failed to send state to client {} in session {}: {}",
                    attachment.client_id,
                    self.id,
                    e
                ),
            }
        }
        delivered
    }

    /// Last time a client changed anything in this session.
    pub fn last_activity(&self) -> Instant {
        self.lock().last_activity
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }
}
