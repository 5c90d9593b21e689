use crate::media::RemoteTrack;
use playback_core::ConnId;

/// Изменение набора входящих трансляций экрана, видимое владельцу сессии.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshChange {
    StreamAdded(ConnId, RemoteTrack),
    StreamRemoved(ConnId),
    PeerRemoved(ConnId),
}
