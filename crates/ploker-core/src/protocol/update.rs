//! Client-to-server update messages.
//!
//! Wire shape: `{"Type": 0, "Key": "reveal", "Value": true}` where `Type` is
//! the numeric update kind. `Key` and `Value` may be omitted for resets.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value::Value;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unknown update type: {0}")]
    UnknownKind(u8),

    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// What an update asks the server to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum UpdateKind {
    /// Set `world[key] = value`.
    World,
    /// Set `clients[sender][key] = value`.
    User,
    /// Clear the world and every client except their names.
    Reset,
    /// Count down, then set `world[key] = value`.
    Reveal,
}

impl From<UpdateKind> for u8 {
    fn from(kind: UpdateKind) -> Self {
        match kind {
            UpdateKind::World => 0,
            UpdateKind::User => 1,
            UpdateKind::Reset => 2,
            UpdateKind::Reveal => 3,
        }
    }
}

impl TryFrom<u8> for UpdateKind {
    type Error = ProtocolError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            0 => Ok(UpdateKind::World),
            1 => Ok(UpdateKind::User),
            2 => Ok(UpdateKind::Reset),
            3 => Ok(UpdateKind::Reveal),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

/// A request from a client to change session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Update {
    #[serde(rename = "Type")]
    pub kind: UpdateKind,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl Update {
    pub fn world(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            kind: UpdateKind::World,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn user(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            kind: UpdateKind::User,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn reset() -> Self {
        Self {
            kind: UpdateKind::Reset,
            key: String::new(),
            value: Value::Null,
        }
    }

    pub fn reveal(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            kind: UpdateKind::Reveal,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Decode an update received from a client.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
