use crate::call::CallPhase;
use crate::media::{RemoteStream, RemoteTrack};
use playback_core::ConnId;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Команды, которые приложение отправляет в цикл сессии через [`SessionHandle`].
///
/// [`SessionHandle`]: crate::session::SessionHandle
#[derive(Debug)]
pub enum SessionCommand {
    Connect,
    ToggleScreenShare,
    ToggleCamera,
    Mute,
    Unmute,
    StartShare,
    StopShare,
    SendChat(String),
    RequestMembers,
    Inspect(oneshot::Sender<SessionSnapshot>),
    Leave,
}

/// Point-in-time view of a session, answered to [`SessionCommand::Inspect`].
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub local_id: Option<ConnId>,
    pub members: Vec<ConnId>,
    pub call_phase: CallPhase,
    pub call_remote: Option<ConnId>,
    pub audio_enabled: Option<bool>,
    pub call_tracks: Vec<RemoteTrack>,
    pub mesh_peers: Vec<ConnId>,
    pub share_streams: HashMap<ConnId, RemoteStream>,
    pub sharing: bool,
}
