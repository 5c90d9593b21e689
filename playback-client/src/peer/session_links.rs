use crate::media::MediaDevices;
use crate::signaling::SignalingSink;
use crate::transport::{TransportEvent, TransportFactory};
use playback_core::RoomId;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Collaborators shared by the main-call and mesh managers of one session.
#[derive(Clone)]
pub struct SessionLinks {
    pub room_id: RoomId,
    pub signaling: Arc<dyn SignalingSink>,
    pub factory: Arc<dyn TransportFactory>,
    pub devices: Arc<dyn MediaDevices>,
    /// Handed to every transport the session creates.
    pub transport_tx: mpsc::UnboundedSender<TransportEvent>,
}
