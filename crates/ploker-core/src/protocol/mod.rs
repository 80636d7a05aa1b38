//! Wire protocol shared by server and clients.
//!
//! Clients send [`Update`]s; the server answers every change with a full
//! [`SessionState`] snapshot. Both are JSON.

mod path;
mod state;
mod update;
mod value;

pub use path::{session_id_from_path, PathError};
pub use state::{
    ClientId, ClientState, SessionState, WorldState, BID_KEY, COUNTDOWN_KEY, DID_BID_KEY,
    NAME_KEY, REVEAL_KEY,
};
pub use update::{ProtocolError, Update, UpdateKind};
pub use value::Value;
