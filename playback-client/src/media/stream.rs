use playback_core::ConnId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

impl TrackSource {
    pub fn kind(self) -> TrackKind {
        match self {
            Self::Microphone => TrackKind::Audio,
            Self::Camera | Self::Screen => TrackKind::Video,
        }
    }
}

#[derive(Debug)]
struct LocalTrackInner {
    id: String,
    stream_id: String,
    source: TrackSource,
    enabled: AtomicBool,
    live: AtomicBool,
}

/// A captured outbound track. Clones share the same flags, so muting through
/// one handle is seen by every sender carrying the track.
#[derive(Debug, Clone)]
pub struct LocalTrack {
    inner: Arc<LocalTrackInner>,
}

impl LocalTrack {
    pub fn new(stream_id: impl Into<String>, source: TrackSource) -> Self {
        Self {
            inner: Arc::new(LocalTrackInner {
                id: Uuid::new_v4().to_string(),
                stream_id: stream_id.into(),
                source,
                enabled: AtomicBool::new(true),
                live: AtomicBool::new(true),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn stream_id(&self) -> &str {
        &self.inner.stream_id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.source.kind()
    }

    pub fn source(&self) -> TrackSource {
        self.inner.source
    }

    /// Send flag. A disabled track stays attached and negotiated.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Ends capture for good.
    pub fn stop(&self) {
        self.inner.live.store(false, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }
}

/// Tracks captured together, exclusively owned by the capturing client.
#[derive(Debug, Clone)]
pub struct LocalStream {
    id: String,
    tracks: Vec<LocalTrack>,
}

impl LocalStream {
    /// Fresh stream with one live track per source.
    pub fn capture(sources: &[TrackSource]) -> Self {
        let id = Uuid::new_v4().to_string();
        let tracks = sources
            .iter()
            .map(|source| LocalTrack::new(id.clone(), *source))
            .collect();
        Self { id, tracks }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.id().to_owned()).collect()
    }

    pub fn audio_track(&self) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Audio)
    }

    pub fn track_from(&self, source: TrackSource) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.source() == source)
    }

    pub fn push(&mut self, track: LocalTrack) {
        self.tracks.push(track);
    }

    pub fn remove(&mut self, track_id: &str) -> Option<LocalTrack> {
        let index = self.tracks.iter().position(|t| t.id() == track_id)?;
        Some(self.tracks.remove(index))
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}

/// Media received from one sender. Read-only to the receiving side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub sender: ConnId,
    pub tracks: Vec<RemoteTrack>,
}

impl RemoteStream {
    pub fn new(sender: ConnId) -> Self {
        Self {
            sender,
            tracks: Vec::new(),
        }
    }

    pub fn add(&mut self, track: RemoteTrack) {
        if !self.tracks.iter().any(|t| t.id == track.id) {
            self.tracks.push(track);
        }
    }
}
