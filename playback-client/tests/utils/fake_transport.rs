use async_trait::async_trait;
use playback_client::{
    IceState, LocalTrack, PeerKey, PeerTransport, RemoteTrack, Result, SenderId, TrackKind,
    TransportEvent, TransportFactory,
};
use playback_core::{IceCandidate, SessionDescription};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// In-memory negotiation handle.
///
/// Descriptions carry the outbound track list as `tracks=id:stream:kind,...`,
/// so applying a remote description reports the tracks that appeared or
/// disappeared since the last one. One local candidate is produced with the
/// first local description and ICE reports `Connected` once both sides'
/// descriptions are in place.
pub struct FakeTransport {
    key: PeerKey,
    events: mpsc::UnboundedSender<TransportEvent>,
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    local_tracks: Vec<RemoteTrack>,
    remote_tracks: Vec<RemoteTrack>,
    has_local: bool,
    has_remote: bool,
    connected: bool,
    closed: bool,
}

impl FakeTransport {
    fn new(key: PeerKey, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            key,
            events,
            state: Mutex::new(FakeState::default()),
        }
    }

    fn describe(&self, offer: bool) -> SessionDescription {
        let mut state = self.state.lock().unwrap();
        let tracks: Vec<String> = state
            .local_tracks
            .iter()
            .map(|t| format!("{}:{}:{}", t.id, t.stream_id, kind_name(t.kind)))
            .collect();
        let sdp = format!("fake {} tracks={}", self.key, tracks.join(","));

        if !state.has_local {
            state.has_local = true;
            self.emit(
                &state,
                TransportEvent::CandidateGenerated(
                    self.key.clone(),
                    IceCandidate::new(format!("candidate:{}", self.key)),
                ),
            );
        }
        self.maybe_connect(&mut state);

        if offer {
            SessionDescription::offer(sdp)
        } else {
            SessionDescription::answer(sdp)
        }
    }

    fn maybe_connect(&self, state: &mut FakeState) {
        if state.connected || !state.has_local || !state.has_remote {
            return;
        }
        state.connected = true;
        self.emit(
            state,
            TransportEvent::IceStateChanged(self.key.clone(), IceState::Connected),
        );
    }

    fn emit(&self, state: &FakeState, event: TransportEvent) {
        if !state.closed {
            let _ = self.events.send(event);
        }
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn create_offer(&self) -> Result<SessionDescription> {
        Ok(self.describe(true))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        Ok(self.describe(false))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let incoming = parse_tracks(&description.sdp);
        let mut state = self.state.lock().unwrap();

        for track in &incoming {
            if !state.remote_tracks.iter().any(|t| t.id == track.id) {
                self.emit(
                    &state,
                    TransportEvent::TrackAdded(self.key.clone(), track.clone()),
                );
            }
        }
        for track in &state.remote_tracks {
            if !incoming.iter().any(|t| t.id == track.id) {
                self.emit(
                    &state,
                    TransportEvent::TrackEnded(self.key.clone(), track.id.clone()),
                );
            }
        }

        state.remote_tracks = incoming;
        state.has_remote = true;
        self.maybe_connect(&mut state);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }

    async fn add_ice_candidate(&self, _candidate: IceCandidate) -> Result<()> {
        Ok(())
    }

    async fn add_track(&self, track: &LocalTrack) -> Result<SenderId> {
        self.state.lock().unwrap().local_tracks.push(RemoteTrack {
            id: track.id().to_owned(),
            stream_id: track.stream_id().to_owned(),
            kind: track.kind(),
        });
        Ok(SenderId(track.id().to_owned()))
    }

    async fn remove_track(&self, sender: &SenderId) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .local_tracks
            .retain(|t| t.id != sender.0);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

fn kind_name(kind: TrackKind) -> &'static str {
    match kind {
        TrackKind::Audio => "audio",
        TrackKind::Video => "video",
    }
}

fn parse_tracks(sdp: &str) -> Vec<RemoteTrack> {
    let Some((_, list)) = sdp.split_once("tracks=") else {
        return Vec::new();
    };
    list.split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(':');
            let id = parts.next()?;
            let stream_id = parts.next()?;
            let kind = match parts.next()? {
                "audio" => TrackKind::Audio,
                _ => TrackKind::Video,
            };
            Some(RemoteTrack {
                id: id.to_owned(),
                stream_id: stream_id.to_owned(),
                kind,
            })
        })
        .collect()
}

/// Hands out [`FakeTransport`]s and remembers what it created.
#[derive(Default)]
pub struct FakeTransportFactory {
    created: Mutex<HashMap<PeerKey, usize>>,
}

impl FakeTransportFactory {
    pub fn created(&self, key: &PeerKey) -> usize {
        self.created.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn mesh_created(&self) -> usize {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| matches!(k, PeerKey::Mesh(_)))
            .map(|(_, n)| n)
            .sum()
    }
}

#[async_trait]
impl TransportFactory for FakeTransportFactory {
    async fn create(
        &self,
        key: PeerKey,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        *self.created.lock().unwrap().entry(key.clone()).or_default() += 1;
        Ok(Arc::new(FakeTransport::new(key, events)))
    }
}
