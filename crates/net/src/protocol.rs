//! Live channel message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire.

use std::collections::BTreeMap;

use draft_core::RoomState;
use draft_engine::{AuctionEvent, Command};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sent by a client. `Join` must come first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    Join { tournament_code: String },
    Command { command: Command },
    Ping,
}

/// Sent by a worker to its clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full snapshot sent once the join succeeds
    Joined {
        room: RoomState,
        display_credits: BTreeMap<Uuid, u32>,
    },

    /// Full snapshot after a structural change
    State {
        room: RoomState,
        display_credits: BTreeMap<Uuid, u32>,
    },

    Event { event: AuctionEvent },

    /// A command or join failed; only the sender receives this
    Rejected { code: String, message: String },

    Pong,

    ServerShutdown,
}

impl ServerMessage {
    pub fn joined(room: &RoomState) -> Self {
        ServerMessage::Joined {
            display_credits: room.display_credits(),
            room: room.clone(),
        }
    }

    pub fn state(room: &RoomState) -> Self {
        ServerMessage::State {
            display_credits: room.display_credits(),
            room: room.clone(),
        }
    }

    pub fn rejected(err: &draft_core::Error) -> Self {
        ServerMessage::Rejected {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// JSON encoding shared by both directions
pub trait WireMessage: Serialize + DeserializeOwned + Sized {
    fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl WireMessage for ClientMessage {}
impl WireMessage for ServerMessage {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_shape() {
        let captain_id = Uuid::new_v4();
        let msg = ClientMessage::Command {
            command: Command::PlaceBid { captain_id, amount: 65 },
        };

        let json: serde_json::Value = serde_json::from_slice(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(json["type"], "Command");
        assert_eq!(json["command"]["type"], "PlaceBid");
        assert_eq!(json["command"]["amount"], 65);

        match ClientMessage::from_bytes(&msg.to_bytes().unwrap()).unwrap() {
            ClientMessage::Command {
                command: Command::PlaceBid { captain_id: id, .. },
            } => assert_eq!(id, captain_id),
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_rejection_carries_stable_code() {
        let msg = ServerMessage::rejected(&draft_core::Error::BidTooLow { amount: 50, current: 60 });
        match msg {
            ServerMessage::Rejected { code, message } => {
                assert_eq!(code, "BidTooLow");
                assert!(message.contains("50"));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_join_must_name_a_tournament() {
        assert!(ClientMessage::from_bytes(br#"{"type":"Join"}"#).is_err());
        assert!(matches!(
            ClientMessage::from_bytes(br#"{"type":"Join","tournament_code":"ABCD"}"#).unwrap(),
            ClientMessage::Join { .. }
        ));
    }
}
