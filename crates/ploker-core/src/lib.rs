//! # ploker-core
//!
//! Core session engine for Ploker, a real-time planning poker service.
//!
//! This crate is transport-agnostic and can be driven by:
//! - the HTTP server (via WebSocket)
//! - tests (via in-memory channels)
//!
//! ## Key Concepts
//!
//! - **Session**: Shared state for one group of estimators, alive while any
//!   client is attached
//! - **Update**: A client request to change world or per-client state
//! - **Snapshot**: The full session state, broadcast after every change
//! - **Connection**: One client link, with its own bounded outbox

pub mod config;
pub mod connection;
pub mod protocol;
pub mod session;

// Re-export commonly used types
pub use config::SyncConfig;
pub use connection::{
    serve_connection, Connection, ConnectionError, Frame, JoinRequest, Outbox, TransportError,
};
pub use protocol::{session_id_from_path, ClientId, SessionState, Update, UpdateKind, Value};
pub use session::{ManagerStats, Session, SessionError, SessionId, SessionManager};
