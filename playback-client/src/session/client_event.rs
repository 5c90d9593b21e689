use crate::call::CallPhase;
use crate::media::{RemoteTrack, TrackSource};
use playback_core::ConnId;
use serde_json::Value;

/// What a running session reports back to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Welcome(ConnId),
    /// Other members of the room, as listed by the server.
    RoomSnapshot(Vec<ConnId>),
    MemberJoined(ConnId),
    MemberLeft(ConnId),
    CallPhaseChanged(CallPhase),
    /// Capture of these sources was refused; nothing changed.
    CaptureDenied(Vec<TrackSource>),
    ShareStreamAdded(ConnId, RemoteTrack),
    ShareStreamRemoved(ConnId),
    Chat { from: ConnId, payload: Value },
    NegotiationStalled,
    ServerError(String),
    Closed,
}
