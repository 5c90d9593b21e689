use crate::error::Result;
use crate::media::LocalTrack;
use crate::transport::TransportEvent;
use async_trait::async_trait;
use playback_core::{ConnId, IceCandidate, IceServerConfig, SessionDescription};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Which connection a transport belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeerKey {
    /// The single main-call connection of the session.
    Main,
    /// A screen-share mesh connection to one other member.
    Mesh(ConnId),
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Mesh(id) => write!(f, "mesh:{id}"),
        }
    }
}

/// Handle to one outbound sender, returned by [`PeerTransport::add_track`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SenderId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::Completed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

/// One negotiation handle. `create_offer` and `create_answer` also apply the
/// result as the local description.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Drops a pending local offer and returns to the stable state.
    async fn rollback(&self) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn add_track(&self, track: &LocalTrack) -> Result<SenderId>;

    async fn remove_track(&self, sender: &SenderId) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Creates transports whose callbacks all report into one event channel.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        key: PeerKey,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>>;

    /// Applies to transports created afterwards.
    async fn set_ice_servers(&self, _ice_servers: Vec<IceServerConfig>) {}
}
