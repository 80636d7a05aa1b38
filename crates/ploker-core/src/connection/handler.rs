//! Connection lifecycle.
//!
//! [`serve_connection`] owns one client link from attach to drain:
//!
//! 1. Join the session and broadcast the new membership.
//! 2. Run three cooperating tasks: a reader applying inbound updates, a
//!    writer draining the outbox into the transport, and the keepalive loop.
//! 3. The first of them to finish ends the connection. The client is
//!    dropped from its session, the remaining clients get a fresh snapshot
//!    and the transport is released.
//!
//! The transport is abstract: anything that yields text messages and accepts
//! [`Frame`]s will do, which keeps this module free of any HTTP framework.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};

use super::keepalive::run_keepalive;
use super::reveal::run_reveal;
use super::{Connection, DeliveryError, Frame, Outbox, TransportError};
use crate::config::SyncConfig;
use crate::protocol::{ClientId, ProtocolError, Update, UpdateKind};
use crate::session::{Session, SessionError, SessionId, SessionManager};

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Session idle for {0:?}")]
    Idle(Duration),

    #[error("Keepalive failed: {0}")]
    Keepalive(DeliveryError),

    #[error("Connection exceeded maximum lifetime of {0:?}")]
    LifetimeExceeded(Duration),

    #[error("Connection task failed: {0}")]
    Task(String),
}

impl From<JoinError> for ConnectionError {
    fn from(e: JoinError) -> Self {
        ConnectionError::Task(e.to_string())
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Connecting,
    Attached,
    Draining,
    Closed,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Attached => "attached",
            ConnectionPhase::Draining => "draining",
            ConnectionPhase::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A validated request to join a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub session_id: SessionId,
    pub name: String,
}

impl JoinRequest {
    /// Both the session id and the client name must be non-empty.
    pub fn new(session_id: &str, name: &str) -> Result<Self, SessionError> {
        if session_id.is_empty() {
            return Err(SessionError::MissingSessionId);
        }
        if name.is_empty() {
            return Err(SessionError::MissingName);
        }
        Ok(Self {
            session_id: SessionId::from(session_id),
            name: name.to_string(),
        })
    }
}

struct Lifecycle {
    phase: ConnectionPhase,
    label: String,
}

impl Lifecycle {
    fn enter(&mut self, next: ConnectionPhase) {
        log::debug!("Connection {}: {} -> {}", self.label, self.phase, next);
        self.phase = next;
    }
}

/// Serve one client until it leaves, fails or times out.
///
/// Returns `Ok(())` when the peer closed the connection cleanly, and the
/// reason otherwise. Either way the client has been removed from its session
/// by the time this returns.
pub async fn serve_connection<R, W>(
    manager: Arc<SessionManager>,
    config: SyncConfig,
    join: JoinRequest,
    inbound: R,
    outbound: W,
) -> Result<(), ConnectionError>
where
    R: Stream<Item = Result<String, TransportError>> + Unpin + Send,
    W: Sink<Frame, Error = TransportError> + Unpin + Send + 'static,
{
    let mut lifecycle = Lifecycle {
        phase: ConnectionPhase::Connecting,
        label: format!("{}@{}", join.name, join.session_id),
    };

    let (connection, outbox) = Connection::channel(config.outbox_capacity);
    let connection_id = connection.id();
    let (session, client_id) = manager.join(&join.session_id, connection.clone(), &join.name);
    lifecycle.label = format!("{}@{}", client_id, join.session_id);
    lifecycle.enter(ConnectionPhase::Attached);
    log::info!(
        "Client {} ({}) joined session {}",
        client_id,
        join.name,
        join.session_id
    );
    session.broadcast();

    let mut writer = tokio::spawn(write_frames(outbound, outbox, config.io_timeout));
    let mut keepalive = tokio::spawn(run_keepalive(
        Arc::clone(&session),
        connection,
        client_id,
        config.clone(),
    ));

    let lifetime = config.max_connection_lifetime;
    let outcome = tokio::time::timeout(lifetime, async {
        tokio::select! {
            result = read_updates(inbound, Arc::clone(&session), client_id, &config) => result,
            result = &mut writer => result.map_err(ConnectionError::from).and_then(|r| r),
            result = &mut keepalive => Err(result.unwrap_or_else(ConnectionError::from)),
        }
    })
    .await
    .unwrap_or(Err(ConnectionError::LifetimeExceeded(lifetime)));

    lifecycle.enter(ConnectionPhase::Draining);
    let removed = manager.drop_connection(&join.session_id, connection_id);
    writer.abort();
    keepalive.abort();
    session.broadcast();
    lifecycle.enter(ConnectionPhase::Closed);

    match &outcome {
        Ok(()) => log::info!("Client {} left session {}", client_id, join.session_id),
        Err(e) => log::info!(
            "Closing connection for client {} in session {}: {}",
            client_id,
            join.session_id,
            e
        ),
    }
    if removed {
        log::info!("Session {} closed", join.session_id);
    }

    outcome
}

/// Apply inbound updates until the peer goes away or sends garbage.
///
/// Reveal countdowns started here live in a local set, so they stop when the
/// connection that started them ends.
async fn read_updates<R>(
    mut inbound: R,
    session: Arc<Session>,
    client_id: ClientId,
    config: &SyncConfig,
) -> Result<(), ConnectionError>
where
    R: Stream<Item = Result<String, TransportError>> + Unpin,
{
    let mut reveals = JoinSet::new();
    loop {
        let text = match inbound.next().await {
            None | Some(Err(TransportError::Closed)) => return Ok(()),
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(text)) => text,
        };

        let update = Update::decode(&text).map_err(|e| {
            log::warn!("Bad update from client {}@{}: {}", client_id, session.id(), e);
            e
        })?;
        apply(&session, client_id, update, &mut reveals, config);
        session.broadcast();

        while reveals.try_join_next().is_some() {}
    }
}

fn apply(
    session: &Arc<Session>,
    client_id: ClientId,
    update: Update,
    reveals: &mut JoinSet<()>,
    config: &SyncConfig,
) {
    match update.kind {
        UpdateKind::World => session.update_world(update.key, update.value),
        UpdateKind::User => {
            if let Err(e) = session.update_user(client_id, update.key, update.value) {
                log::warn!("Dropping update in session {}: {}", session.id(), e);
            }
        }
        UpdateKind::Reset => session.reset(),
        UpdateKind::Reveal => {
            reveals.spawn(run_reveal(
                Arc::clone(session),
                update.key,
                update.value,
                config.reveal_from,
                config.reveal_step,
            ));
        }
    }
}

/// Drain the outbox into the transport, one bounded write at a time.
async fn write_frames<W>(
    mut sink: W,
    mut outbox: Outbox,
    io_timeout: Duration,
) -> Result<(), ConnectionError>
where
    W: Sink<Frame, Error = TransportError> + Unpin,
{
    while let Some(frame) = outbox.recv().await {
        match tokio::time::timeout(io_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ConnectionError::WriteTimeout(io_timeout)),
        }
    }
    Ok(())
}
