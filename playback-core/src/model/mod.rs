mod conn;
mod envelope;
mod negotiation;
mod room;
mod signaling;

pub use conn::ConnId;
pub use envelope::{ClientMessage, ServerMessage};
pub use negotiation::{IceCandidate, SdpKind, SessionDescription};
pub use room::RoomId;
pub use signaling::IceServerConfig;
