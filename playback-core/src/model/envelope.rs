use crate::error::EnvelopeError;
use crate::model::{ConnId, IceServerConfig, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything a client may send to the signaling server.
///
/// `payload` is opaque to the server: it is forwarded untouched and never
/// inspected. Broadcast kinds address a room, screen-share kinds address a
/// single connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    SendMsg {
        room_id: RoomId,
        payload: Value,
    },
    Offer {
        room_id: RoomId,
        payload: Value,
    },
    Answer {
        room_id: RoomId,
        payload: Value,
    },
    IceCandidate {
        room_id: RoomId,
        payload: Value,
    },
    ScreenShareOffer {
        target_id: ConnId,
        payload: Value,
    },
    ScreenShareAnswer {
        target_id: ConnId,
        payload: Value,
    },
    ScreenShareIceCandidate {
        target_id: ConnId,
        payload: Value,
    },
    GetUsersInRoom {
        room_id: RoomId,
    },
}

impl ClientMessage {
    /// Parses and validates one text frame.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join-room",
            Self::LeaveRoom { .. } => "leave-room",
            Self::SendMsg { .. } => "send-msg",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::ScreenShareOffer { .. } => "screen-share-offer",
            Self::ScreenShareAnswer { .. } => "screen-share-answer",
            Self::ScreenShareIceCandidate { .. } => "screen-share-ice-candidate",
            Self::GetUsersInRoom { .. } => "get-users-in-room",
        }
    }
}

/// Everything the signaling server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome {
        conn_id: ConnId,
        ice_servers: Vec<IceServerConfig>,
    },
    UsersInRoom {
        room_id: RoomId,
        users: Vec<ConnId>,
    },
    UserJoined {
        room_id: RoomId,
        conn_id: ConnId,
    },
    UserLeft {
        room_id: RoomId,
        conn_id: ConnId,
    },
    ReceiveMsg {
        room_id: RoomId,
        from: ConnId,
        payload: Value,
    },
    Offer {
        room_id: RoomId,
        from: ConnId,
        payload: Value,
    },
    Answer {
        room_id: RoomId,
        from: ConnId,
        payload: Value,
    },
    IceCandidate {
        room_id: RoomId,
        from: ConnId,
        payload: Value,
    },
    ScreenShareOffer {
        from: ConnId,
        payload: Value,
    },
    ScreenShareAnswer {
        from: ConnId,
        payload: Value,
    },
    ScreenShareIceCandidate {
        from: ConnId,
        payload: Value,
    },
    Error {
        message: String,
    },
}
