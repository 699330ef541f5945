use serde::{Deserialize, Serialize};

use super::types::{ClientId, OutboundMessage, RoomName, SignalingError};

/// Messages sent from client to server
///
/// Relay variants only capture the routing target; everything else in the
/// frame is opaque and is forwarded as the original text.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Create a room (or reuse an existing one) and enter it
    #[serde(rename = "create")]
    Create { room: RoomName },

    /// Join an existing room
    #[serde(rename = "join")]
    Join { room: RoomName },

    /// Leave the current room
    #[serde(rename = "leave")]
    Leave,

    #[serde(rename = "offer")]
    Offer {
        #[serde(default)]
        to: Option<ClientId>,
    },

    #[serde(rename = "answer")]
    Answer {
        #[serde(default)]
        to: Option<ClientId>,
    },

    #[serde(rename = "ice-candidate")]
    IceCandidate {
        #[serde(default)]
        to: Option<ClientId>,
    },

    /// Any other `type` value
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, SignalingError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Identifier assigned on connect
    Id { id: ClientId },

    /// Room created (or re-entered) successfully
    Created { room: RoomName },

    /// Joined room successfully, with the members present before the join
    Joined { room: RoomName, peers: Vec<ClientId> },

    /// A new peer joined the room
    NewPeer {
        #[serde(rename = "peerId")]
        peer_id: ClientId,
    },

    /// A peer left the room or disconnected
    PeerLeft {
        #[serde(rename = "peerId")]
        peer_id: ClientId,
    },

    /// Error response
    Error { message: String },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<OutboundMessage, SignalingError> {
        Ok(OutboundMessage::from(serde_json::to_string(self)?))
    }
}

impl From<&SignalingError> for ServerMessage {
    fn from(err: &SignalingError) -> Self {
        ServerMessage::Error {
            message: err.to_string(),
        }
    }
}
