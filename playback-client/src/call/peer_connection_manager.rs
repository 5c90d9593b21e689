use crate::call::{CallPhase, ToggleOutcome};
use crate::error::Result;
use crate::media::{LocalStream, MediaRequest, TrackSource};
use crate::peer::{
    NegotiationRole, OfferDisposition, PeerConnectionState, SessionLinks, SignalingPhase,
};
use crate::signaling::to_payload;
use crate::transport::{PeerKey, TransportEvent};
use playback_core::{ClientMessage, ConnId, IceCandidate, SessionDescription};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Owns the single main-call connection of a room session.
///
/// Offers, answers and candidates for the call are broadcast to the room. The
/// first member whose answer (or offer) is accepted becomes the counterpart;
/// call signaling from anyone else is ignored until the call is torn down.
pub struct PeerConnectionManager {
    links: SessionLinks,
    local_id: Option<ConnId>,
    answer_with_media: bool,
    phase: CallPhase,
    peer: Option<PeerConnectionState>,
    remote_id: Option<ConnId>,
    local_media: Option<LocalStream>,
    screen: Option<LocalStream>,
    negotiation_started: Option<Instant>,
    stall_reported: bool,
}

impl PeerConnectionManager {
    pub fn new(links: SessionLinks, answer_with_media: bool) -> Self {
        Self {
            links,
            local_id: None,
            answer_with_media,
            phase: CallPhase::Idle,
            peer: None,
            remote_id: None,
            local_media: None,
            screen: None,
            negotiation_started: None,
            stall_reported: false,
        }
    }

    pub fn set_local_id(&mut self, conn_id: ConnId) {
        self.local_id = Some(conn_id);
    }

    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    pub fn remote_id(&self) -> Option<&ConnId> {
        self.remote_id.as_ref()
    }

    pub fn peer(&self) -> Option<&PeerConnectionState> {
        self.peer.as_ref()
    }

    pub fn local_media(&self) -> Option<&LocalStream> {
        self.local_media.as_ref()
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.screen.is_some()
    }

    /// Whether the outbound audio track is sending. `None` without audio.
    pub fn audio_enabled(&self) -> Option<bool> {
        self.local_media
            .as_ref()
            .and_then(|s| s.audio_track())
            .map(|t| t.is_enabled())
    }

    /// Captures microphone and camera and broadcasts an offer to the room.
    /// Returns `false` when capture is refused; the phase is left untouched.
    pub async fn connect(&mut self) -> Result<bool> {
        if self.peer.is_some() || !self.phase.can_connect() {
            info!(phase = ?self.phase, "Call already in progress");
            return Ok(true);
        }

        let Some(stream) = self
            .links
            .devices
            .get_user_media(MediaRequest::audio_video())
            .await
        else {
            warn!("Capture denied, call not started");
            return Ok(false);
        };

        info!(room_id = %self.links.room_id, "Starting call");
        let (peer, offer) = match self.open_call(&stream).await {
            Ok(opened) => opened,
            Err(e) => {
                stream.stop();
                return Err(e);
            }
        };

        if let Some(previous) = self.local_media.replace(stream) {
            previous.stop();
        }
        self.phase = CallPhase::Connecting;
        self.peer = Some(peer);
        self.send_offer(&offer)?;
        self.begin_negotiation();
        Ok(true)
    }

    pub async fn handle_remote_offer(
        &mut self,
        offer: SessionDescription,
        from: ConnId,
    ) -> Result<()> {
        if self.remote_id.as_ref().is_some_and(|remote| *remote != from) {
            debug!(%from, "Call offer from a non-counterpart ignored");
            return Ok(());
        }

        if self.peer.is_none() {
            info!(%from, "Incoming call");
            let mut peer = self.open_peer().await?;

            if self.answer_with_media {
                if self.local_media.is_none() {
                    self.local_media = self
                        .links
                        .devices
                        .get_user_media(MediaRequest::audio_video())
                        .await;
                }
                match &self.local_media {
                    Some(stream) => {
                        if let Err(e) = attach_all(&mut peer, stream).await {
                            peer.close().await;
                            return Err(e);
                        }
                    }
                    None => info!("Answering without local media"),
                }
            }
            self.peer = Some(peer);
        }

        let role = self.role_for(&from);
        let Some(peer) = self.peer.as_mut() else {
            return Ok(());
        };
        if let Some(role) = role {
            peer.set_role(role);
        }

        let OfferDisposition::Answered {
            answer,
            rolled_back,
        } = peer.accept_offer(offer).await?
        else {
            return Ok(());
        };

        self.remote_id = Some(from);
        self.send(ClientMessage::Answer {
            room_id: self.links.room_id.clone(),
            payload: to_payload(&answer)?,
        })?;
        self.begin_negotiation();

        // Our own changes were dropped by the rollback; offer them again.
        if rolled_back {
            self.renegotiate().await?;
        }
        self.check_connected();
        Ok(())
    }

    pub async fn handle_remote_answer(
        &mut self,
        answer: SessionDescription,
        from: ConnId,
    ) -> Result<()> {
        if self.remote_id.as_ref().is_some_and(|remote| *remote != from) {
            debug!(%from, "Call answer from a non-counterpart ignored");
            return Ok(());
        }

        let role = self.role_for(&from);
        let Some(peer) = self.peer.as_mut() else {
            warn!(%from, "Answer with no pending call connection ignored");
            return Ok(());
        };
        if peer.role().is_none()
            && let Some(role) = role
        {
            peer.set_role(role);
        }

        if peer.accept_answer(answer).await? {
            self.remote_id.get_or_insert(from);
            self.check_connected();
        }
        Ok(())
    }

    pub async fn handle_remote_ice_candidate(
        &mut self,
        candidate: IceCandidate,
        from: ConnId,
    ) -> Result<()> {
        if self.remote_id.as_ref().is_some_and(|remote| *remote != from) {
            debug!(%from, "Call candidate from a non-counterpart ignored");
            return Ok(());
        }
        let Some(peer) = self.peer.as_mut() else {
            warn!(%from, "ICE candidate with no call connection ignored");
            return Ok(());
        };
        peer.add_remote_candidate(candidate).await
    }

    pub async fn toggle_screen_share(&mut self) -> Result<ToggleOutcome> {
        if let Some(screen) = self.screen.take() {
            screen.stop();
            if let Some(peer) = self.peer.as_mut() {
                for track_id in screen.track_ids() {
                    peer.detach(&track_id).await?;
                }
            }
            self.renegotiate().await?;
            return Ok(ToggleOutcome::Off);
        }

        let Some(screen) = self.links.devices.get_display_media().await else {
            return Ok(ToggleOutcome::Denied);
        };
        if let Some(peer) = self.peer.as_mut() {
            for track in screen.tracks() {
                peer.attach(track).await?;
            }
        }
        self.screen = Some(screen);
        self.renegotiate().await?;
        Ok(ToggleOutcome::On)
    }

    pub async fn toggle_camera(&mut self) -> Result<ToggleOutcome> {
        let camera = self
            .local_media
            .as_ref()
            .and_then(|s| s.track_from(TrackSource::Camera))
            .cloned();

        if let Some(track) = camera {
            track.stop();
            if let Some(stream) = self.local_media.as_mut() {
                stream.remove(track.id());
            }
            if let Some(peer) = self.peer.as_mut() {
                peer.detach(track.id()).await?;
            }
            self.renegotiate().await?;
            return Ok(ToggleOutcome::Off);
        }

        let Some(captured) = self
            .links
            .devices
            .get_user_media(MediaRequest::video_only())
            .await
        else {
            return Ok(ToggleOutcome::Denied);
        };
        let Some(track) = captured.track_from(TrackSource::Camera).cloned() else {
            return Ok(ToggleOutcome::Denied);
        };

        match self.local_media.as_mut() {
            Some(stream) => stream.push(track.clone()),
            None => self.local_media = Some(captured),
        }
        if let Some(peer) = self.peer.as_mut() {
            peer.attach(&track).await?;
        }
        self.renegotiate().await?;
        Ok(ToggleOutcome::On)
    }

    /// Stops sending audio. Purely local: no renegotiation, no messages.
    pub fn mute(&self) -> bool {
        self.set_audio_enabled(false)
    }

    pub fn unmute(&self) -> bool {
        self.set_audio_enabled(true)
    }

    fn set_audio_enabled(&self, enabled: bool) -> bool {
        let Some(track) = self.local_media.as_ref().and_then(|s| s.audio_track()) else {
            return false;
        };
        track.set_enabled(enabled);
        debug!(enabled, "Audio send flag changed");
        true
    }

    pub async fn on_transport_event(&mut self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                if self.peer.is_none() {
                    return Ok(());
                }
                self.send(ClientMessage::IceCandidate {
                    room_id: self.links.room_id.clone(),
                    payload: to_payload(&candidate)?,
                })?;
            }

            TransportEvent::IceStateChanged(_, state) => {
                let Some(peer) = self.peer.as_mut() else {
                    return Ok(());
                };
                peer.set_ice_state(state);

                if state.is_terminal() {
                    warn!(?state, "Call connection lost");
                    self.close().await;
                } else {
                    self.check_connected();
                }
            }

            TransportEvent::TrackAdded(_, track) => {
                if let Some(peer) = self.peer.as_mut() {
                    debug!(track_id = %track.id, "Call track added");
                    peer.track_added(track);
                }
                self.check_connected();
            }

            TransportEvent::TrackEnded(_, track_id) => {
                if let Some(peer) = self.peer.as_mut() {
                    peer.track_ended(&track_id);
                }
            }
        }
        Ok(())
    }

    pub async fn handle_member_left(&mut self, conn_id: &ConnId) {
        if self.remote_id.as_ref() == Some(conn_id) {
            info!(%conn_id, "Call counterpart left");
            self.close().await;
        }
    }

    /// Tears the call down: connection closed, local capture stopped.
    pub async fn close(&mut self) {
        if let Some(mut peer) = self.peer.take() {
            peer.close().await;
        }
        if let Some(stream) = self.local_media.take() {
            stream.stop();
        }
        if let Some(screen) = self.screen.take() {
            screen.stop();
        }
        self.remote_id = None;
        self.negotiation_started = None;
        if self.phase != CallPhase::Idle {
            self.phase = CallPhase::Closed;
        }
    }

    /// Reports, once per negotiation, a call stuck in `Negotiating` for longer
    /// than `timeout`. The phase is not changed.
    pub fn negotiation_stalled(&mut self, timeout: Duration) -> bool {
        if self.phase != CallPhase::Negotiating || self.stall_reported {
            return false;
        }
        let Some(started) = self.negotiation_started else {
            return false;
        };
        if started.elapsed() < timeout {
            return false;
        }
        self.stall_reported = true;
        warn!(elapsed = ?started.elapsed(), "Call negotiation stalled");
        true
    }

    /// Opens the main connection with `stream` attached and creates the
    /// first offer. The connection is closed again if either step fails.
    async fn open_call(
        &self,
        stream: &LocalStream,
    ) -> Result<(PeerConnectionState, SessionDescription)> {
        let mut peer = self.open_peer().await?;
        let offer = match attach_all(&mut peer, stream).await {
            Ok(()) => peer.create_offer().await,
            Err(e) => Err(e),
        };
        match offer {
            Ok(offer) => Ok((peer, offer)),
            Err(e) => {
                peer.close().await;
                Err(e)
            }
        }
    }

    async fn open_peer(&self) -> Result<PeerConnectionState> {
        let transport = self
            .links
            .factory
            .create(PeerKey::Main, self.links.transport_tx.clone())
            .await?;
        Ok(PeerConnectionState::new(PeerKey::Main, transport, None))
    }

    async fn renegotiate(&mut self) -> Result<()> {
        let Some(peer) = self.peer.as_mut() else {
            return Ok(());
        };
        let offer = peer.create_offer().await?;
        self.send_offer(&offer)?;
        self.begin_negotiation();
        Ok(())
    }

    fn begin_negotiation(&mut self) {
        self.phase = CallPhase::Negotiating;
        self.negotiation_started = Some(Instant::now());
        self.stall_reported = false;
    }

    fn check_connected(&mut self) {
        let Some(peer) = &self.peer else {
            return;
        };
        let ready = peer.ice_state().is_connected()
            && !peer.remote_tracks().is_empty()
            && peer.phase() == SignalingPhase::Stable;

        if ready && matches!(self.phase, CallPhase::Connecting | CallPhase::Negotiating) {
            info!(remote = ?self.remote_id, "Call connected");
            self.phase = CallPhase::Connected;
            self.negotiation_started = None;
        }
    }

    fn role_for(&self, remote: &ConnId) -> Option<NegotiationRole> {
        self.local_id
            .as_ref()
            .map(|local| NegotiationRole::between(local, remote))
    }

    fn send_offer(&self, offer: &SessionDescription) -> Result<()> {
        self.send(ClientMessage::Offer {
            room_id: self.links.room_id.clone(),
            payload: to_payload(offer)?,
        })
    }

    fn send(&self, message: ClientMessage) -> Result<()> {
        debug!(kind = message.kind(), "Call signaling out");
        self.links.signaling.send(message)
    }
}

async fn attach_all(peer: &mut PeerConnectionState, stream: &LocalStream) -> Result<()> {
    for track in stream.tracks() {
        peer.attach(track).await?;
    }
    Ok(())
}
