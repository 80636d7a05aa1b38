//! Server-to-client state snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::value::Value;

/// Client display name. The only field that survives a reset.
pub const NAME_KEY: &str = "name";
/// A client's current estimate.
pub const BID_KEY: &str = "bid";
/// Whether a client has placed an estimate this round.
pub const DID_BID_KEY: &str = "didBid";
/// World flag: show everyone's bids.
pub const REVEAL_KEY: &str = "reveal";
/// World counter driven by the reveal countdown.
pub const COUNTDOWN_KEY: &str = "countdown";

/// Identifier of a client within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-client key/value record.
pub type ClientState = BTreeMap<String, Value>;

/// Key/value record shared by every client in a session.
pub type WorldState = BTreeMap<String, Value>;

/// Everything a session shares with its clients. Sent verbatim on every
/// broadcast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionState {
    pub clients: BTreeMap<ClientId, ClientState>,
    pub world: WorldState,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionState {
        let mut state = SessionState::new();
        let mut client = ClientState::new();
        client.insert(NAME_KEY.to_string(), Value::from("ada"));
        client.insert(BID_KEY.to_string(), Value::from(5));
        state.clients.insert(ClientId(17), client);
        state.world.insert(REVEAL_KEY.to_string(), Value::from(false));
        state
    }

    #[test]
    fn encodes_with_pascal_case_fields_and_string_client_keys() {
        let json: serde_json::Value = serde_json::from_str(&sample().encode().unwrap()).unwrap();
        assert_eq!(json["Clients"]["17"]["name"], "ada");
        assert_eq!(json["Clients"]["17"]["bid"], 5);
        assert_eq!(json["World"]["reveal"], false);
    }

    #[test]
    fn decodes_what_the_server_sends() {
        let text = r#"{"Clients": {"4000000000": {"name": "bo", "didBid": true}}, "World": {"countdown": 2}}"#;
        let state = SessionState::decode(text).unwrap();
        let client = &state.clients[&ClientId(4_000_000_000)];
        assert_eq!(client[DID_BID_KEY], Value::Bool(true));
        assert_eq!(state.world[COUNTDOWN_KEY].as_i64(), Some(2));
    }

    #[test]
    fn empty_state_encodes_empty_maps() {
        assert_eq!(
            SessionState::new().encode().unwrap(),
            r#"{"Clients":{},"World":{}}"#
        );
    }

    #[test]
    fn client_id_display() {
        assert_eq!(ClientId(99).to_string(), "99");
    }
}
