//! Per-client connections.
//!
//! A [`Connection`] is the session-facing half of a client link: a handle to
//! a bounded outbox of [`Frame`]s. The transport-facing half lives in
//! [`handler`], which drains the [`Outbox`] into whatever sink the transport
//! provides and feeds inbound messages back into the session.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `handler` | Connection lifecycle: attach, read loop, writer, drain |
//! | `keepalive` | Periodic ping and idle-session cutoff |
//! | `reveal` | Timed countdown before a world value is committed |

mod handler;
mod keepalive;
mod reveal;

pub use handler::{serve_connection, ConnectionError, ConnectionPhase, JoinRequest};
pub use reveal::run_reveal;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TryRecvError, error::TrySendError};
use tokio::sync::watch;
use uuid::Uuid;

/// An outbound message for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Serialized JSON. Snapshots share one allocation across recipients.
    Text(Arc<str>),
    /// Transport-level liveness check.
    Ping,
}

/// Errors reported by the transport adapter.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection closed by peer")]
    Closed,

    #[error("Transport error: {0}")]
    Io(String),

    #[error("Invalid message encoding: {0}")]
    Encoding(String),
}

/// Why a frame could not be queued for a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbox is full")]
    Backlogged,

    #[error("connection is closed")]
    Closed,

    #[error("timed out waiting for outbox space")]
    TimedOut,
}

/// Unique identifier for an attached connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cloneable handle for queueing frames to one client.
///
/// Besides the bounded frame queue, each connection has a one-slot holder for
/// the newest snapshot that did not fit. The holder is only ever drained once
/// the queue is empty, so a client that falls behind still ends on the
/// latest state.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    outbox: mpsc::Sender<Frame>,
    pending: Arc<watch::Sender<Option<Arc<str>>>>,
}

impl Connection {
    /// Create a connection and the receiving end of its outbox.
    pub fn channel(capacity: usize) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (pending_tx, pending_rx) = watch::channel(None);
        (
            Self {
                id: ConnectionId::new(),
                outbox: tx,
                pending: Arc::new(pending_tx),
            },
            Outbox {
                frames: rx,
                pending: pending_rx,
            },
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame without waiting. Used under the session lock.
    pub fn deliver(&self, frame: Frame) -> Result<(), DeliveryError> {
        self.outbox.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Backlogged,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Queue a state snapshot without waiting.
    ///
    /// A snapshot that does not fit replaces whatever was held back before
    /// and is reported as `Backlogged`. A snapshot that does fit makes any
    /// held-back one obsolete.
    pub fn deliver_snapshot(&self, json: Arc<str>) -> Result<(), DeliveryError> {
        match self.outbox.try_send(Frame::Text(json)) {
            Ok(()) => {
                self.pending.send_if_modified(|slot| slot.take().is_some());
                Ok(())
            }
            Err(TrySendError::Full(Frame::Text(json))) => {
                self.pending.send_replace(Some(json));
                Err(DeliveryError::Backlogged)
            }
            Err(TrySendError::Full(_)) => Err(DeliveryError::Backlogged),
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// Queue a frame, waiting up to `timeout` for outbox space.
    pub async fn send(&self, frame: Frame, timeout: Duration) -> Result<(), DeliveryError> {
        self.outbox
            .send_timeout(frame, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => DeliveryError::TimedOut,
                SendTimeoutError::Closed(_) => DeliveryError::Closed,
            })
    }
}

/// Receiving end of a [`Connection`].
#[derive(Debug)]
pub struct Outbox {
    frames: mpsc::Receiver<Frame>,
    pending: watch::Receiver<Option<Arc<str>>>,
}

impl Outbox {
    /// Next frame to write. Queued frames come first; a held-back snapshot is
    /// handed out only when the queue is empty. Returns None once every
    /// [`Connection`] handle is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            let changed = tokio::select! {
                biased;
                frame = self.frames.recv() => return frame,
                changed = self.pending.changed() => changed,
            };
            if changed.is_err() {
                return self.frames.recv().await;
            }
            if let Some(json) = self.pending.borrow_and_update().clone() {
                return Some(Frame::Text(json));
            }
        }
    }

    /// Non-blocking [`recv`](Outbox::recv).
    pub fn try_recv(&mut self) -> Result<Frame, TryRecvError> {
        match self.frames.try_recv() {
            Err(TryRecvError::Empty) => {}
            other => return other,
        }
        if self.pending.has_changed().unwrap_or(false) {
            if let Some(json) = self.pending.borrow_and_update().clone() {
                return Ok(Frame::Text(json));
            }
        }
        Err(TryRecvError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        let (a, _rx_a) = Connection::channel(1);
        let (b, _rx_b) = Connection::channel(1);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn deliver_reports_backlog() {
        let (conn, _rx) = Connection::channel(1);
        assert!(conn.deliver(Frame::Ping).is_ok());
        assert_eq!(conn.deliver(Frame::Ping), Err(DeliveryError::Backlogged));
    }

    #[test]
    fn deliver_reports_closed() {
        let (conn, rx) = Connection::channel(4);
        drop(rx);
        assert_eq!(conn.deliver(Frame::Ping), Err(DeliveryError::Closed));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let (conn, _rx) = Connection::channel(0);
        assert!(conn.deliver(Frame::Ping).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn send_times_out_when_full() {
        let (conn, _rx) = Connection::channel(1);
        conn.deliver(Frame::Ping).unwrap();
        let result = conn.send(Frame::Ping, Duration::from_secs(1)).await;
        assert_eq!(result, Err(DeliveryError::TimedOut));
    }

    mod snapshots {
        use super::*;

        fn text(s: &str) -> Arc<str> {
            Arc::from(s)
        }

        #[test]
        fn overflow_is_held_until_queue_drains() {
            let (conn, mut rx) = Connection::channel(1);
            conn.deliver_snapshot(text("a")).unwrap();
            assert_eq!(
                conn.deliver_snapshot(text("b")),
                Err(DeliveryError::Backlogged)
            );
            assert_eq!(
                conn.deliver_snapshot(text("c")),
                Err(DeliveryError::Backlogged)
            );

            assert_eq!(rx.try_recv(), Ok(Frame::Text(text("a"))));
            assert_eq!(rx.try_recv(), Ok(Frame::Text(text("c"))));
            assert!(rx.try_recv().is_err());
        }

        #[test]
        fn queued_snapshot_discards_held_one() {
            let (conn, mut rx) = Connection::channel(1);
            conn.deliver_snapshot(text("a")).unwrap();
            let _ = conn.deliver_snapshot(text("b"));

            assert_eq!(rx.try_recv(), Ok(Frame::Text(text("a"))));
            conn.deliver_snapshot(text("c")).unwrap();

            assert_eq!(rx.try_recv(), Ok(Frame::Text(text("c"))));
            assert!(rx.try_recv().is_err());
        }

        #[tokio::test]
        async fn recv_prefers_queued_frames() {
            let (conn, mut rx) = Connection::channel(2);
            conn.deliver(Frame::Ping).unwrap();
            conn.deliver_snapshot(text("a")).unwrap();
            let _ = conn.deliver_snapshot(text("latest"));

            assert_eq!(rx.recv().await, Some(Frame::Ping));
            assert_eq!(rx.recv().await, Some(Frame::Text(text("a"))));
            assert_eq!(rx.recv().await, Some(Frame::Text(text("latest"))));
        }

        #[tokio::test]
        async fn recv_ends_when_connection_is_dropped() {
            let (conn, mut rx) = Connection::channel(2);
            conn.deliver(Frame::Ping).unwrap();
            drop(conn);

            assert_eq!(rx.recv().await, Some(Frame::Ping));
            assert_eq!(rx.recv().await, None);
        }

        #[test]
        fn closed_outbox_is_reported() {
            let (conn, rx) = Connection::channel(1);
            drop(rx);
            assert_eq!(conn.deliver_snapshot(text("a")), Err(DeliveryError::Closed));
        }
    }

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (conn, mut rx) = Connection::channel(4);
        conn.deliver(Frame::Text(Arc::from("one"))).unwrap();
        conn.send(Frame::Text(Arc::from("two")), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some(Frame::Text(Arc::from("one"))));
        assert_eq!(rx.recv().await, Some(Frame::Text(Arc::from("two"))));
    }
}
