//! Sessions: shared state for a group of clients.
//!
//! A session lives exactly as long as it has attached connections.

mod manager;
mod state;

pub use manager::{ManagerStats, SessionError, SessionManager};
pub use state::{Session, SessionId};
