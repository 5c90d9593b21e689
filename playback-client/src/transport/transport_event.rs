use crate::media::RemoteTrack;
use crate::transport::{IceState, PeerKey};
use playback_core::IceCandidate;

/// События, которые транспорт генерирует для цикла сессии.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Сгенерирован локальный ICE-кандидат, его нужно отправить удаленной стороне.
    CandidateGenerated(PeerKey, IceCandidate),

    /// Изменилось состояние ICE соединения.
    IceStateChanged(PeerKey, IceState),

    /// Пришел новый удаленный трек.
    TrackAdded(PeerKey, RemoteTrack),

    /// Удаленный трек завершился (передается его id).
    TrackEnded(PeerKey, String),
}

impl TransportEvent {
    pub fn key(&self) -> &PeerKey {
        match self {
            Self::CandidateGenerated(key, _)
            | Self::IceStateChanged(key, _)
            | Self::TrackAdded(key, _)
            | Self::TrackEnded(key, _) => key,
        }
    }
}
