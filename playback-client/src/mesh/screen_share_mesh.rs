use crate::error::Result;
use crate::media::{LocalStream, RemoteStream, RemoteTrack};
use crate::mesh::MeshChange;
use crate::peer::{NegotiationRole, OfferDisposition, PeerConnectionState, SessionLinks};
use crate::signaling::to_payload;
use crate::transport::{PeerKey, TransportEvent};
use playback_core::{ClientMessage, ConnId, IceCandidate, SessionDescription};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// One connection per other room member, carrying screen shares only.
///
/// Every member holds a connection to every other member, so a room of N
/// members has N·(N-1) mesh connections in total. All signaling is targeted
/// at a single member; nothing here is broadcast.
pub struct ScreenShareMesh {
    links: SessionLinks,
    local_id: Option<ConnId>,
    peers: BTreeMap<ConnId, PeerConnectionState>,
    remote_streams: HashMap<ConnId, RemoteStream>,
    local_share: Option<LocalStream>,
}

impl ScreenShareMesh {
    pub fn new(links: SessionLinks) -> Self {
        Self {
            links,
            local_id: None,
            peers: BTreeMap::new(),
            remote_streams: HashMap::new(),
            local_share: None,
        }
    }

    pub fn set_local_id(&mut self, conn_id: ConnId) {
        for (remote, peer) in self.peers.iter_mut() {
            peer.set_role(NegotiationRole::between(&conn_id, remote));
        }
        self.local_id = Some(conn_id);
    }

    pub fn peer_ids(&self) -> Vec<ConnId> {
        self.peers.keys().cloned().collect()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peer(&self, conn_id: &ConnId) -> Option<&PeerConnectionState> {
        self.peers.get(conn_id)
    }

    pub fn remote_streams(&self) -> &HashMap<ConnId, RemoteStream> {
        &self.remote_streams
    }

    pub fn is_sharing(&self) -> bool {
        self.local_share.is_some()
    }

    /// Opens a connection to a newly observed member. When a share is running
    /// the member gets an offer right away.
    pub async fn add_member(&mut self, conn_id: ConnId) -> Result<()> {
        if self.local_id.as_ref() == Some(&conn_id) || self.peers.contains_key(&conn_id) {
            return Ok(());
        }

        let mut peer = self.open_peer(&conn_id).await?;
        debug!(%conn_id, "Mesh connection opened");

        if let Some(share) = &self.local_share
            && let Err(e) = Self::offer_share(&self.links, &mut peer, &conn_id, share).await
        {
            peer.close().await;
            return Err(e);
        }
        self.peers.insert(conn_id, peer);
        Ok(())
    }

    /// Closes and forgets a departed member's connection and stream.
    pub async fn remove_member(&mut self, conn_id: &ConnId) -> Vec<MeshChange> {
        let mut changes = Vec::new();

        if self.remote_streams.remove(conn_id).is_some() {
            changes.push(MeshChange::StreamRemoved(conn_id.clone()));
        }
        if let Some(mut peer) = self.peers.remove(conn_id) {
            peer.close().await;
            info!(%conn_id, "Mesh connection closed");
            changes.push(MeshChange::PeerRemoved(conn_id.clone()));
        }
        changes
    }

    /// Captures the screen and offers it to every member separately.
    /// Returns `false` when capture is refused.
    pub async fn start_share(&mut self) -> Result<bool> {
        if self.local_share.is_some() {
            return Ok(true);
        }
        let Some(share) = self.links.devices.get_display_media().await else {
            warn!("Screen capture denied");
            return Ok(false);
        };
        info!(peers = self.peers.len(), "Starting screen share");

        for (conn_id, peer) in self.peers.iter_mut() {
            if let Err(e) = Self::offer_share(&self.links, peer, conn_id, &share).await {
                warn!(%conn_id, "Failed to offer screen share: {}", e);
            }
        }
        self.local_share = Some(share);
        Ok(true)
    }

    /// Stops the capture and pulls its tracks from every connection. The
    /// connections themselves stay open.
    pub async fn stop_share(&mut self) {
        let Some(share) = self.local_share.take() else {
            return;
        };
        share.stop();
        info!("Stopping screen share");

        let track_ids = share.track_ids();
        for (conn_id, peer) in self.peers.iter_mut() {
            if let Err(e) = Self::withdraw_share(&self.links, peer, conn_id, &track_ids).await {
                warn!(%conn_id, "Failed to withdraw screen share: {}", e);
            }
        }
    }

    pub async fn handle_offer(&mut self, offer: SessionDescription, from: ConnId) -> Result<()> {
        if !self.peers.contains_key(&from) {
            debug!(%from, "Screen-share offer before membership notice");
            self.add_member(from.clone()).await?;
        }
        let Some(peer) = self.peers.get_mut(&from) else {
            warn!(%from, "Screen-share offer from ourselves ignored");
            return Ok(());
        };

        let OfferDisposition::Answered {
            answer,
            rolled_back,
        } = peer.accept_offer(offer).await?
        else {
            return Ok(());
        };

        self.links.signaling.send(ClientMessage::ScreenShareAnswer {
            target_id: from.clone(),
            payload: to_payload(&answer)?,
        })?;

        if rolled_back {
            let offer = peer.create_offer().await?;
            Self::send_offer(&self.links, &from, &offer)?;
        }
        Ok(())
    }

    pub async fn handle_answer(&mut self, answer: SessionDescription, from: ConnId) -> Result<()> {
        let Some(peer) = self.peers.get_mut(&from) else {
            warn!(%from, "Screen-share answer for unknown member ignored");
            return Ok(());
        };
        peer.accept_answer(answer).await?;
        Ok(())
    }

    pub async fn handle_candidate(&mut self, candidate: IceCandidate, from: ConnId) -> Result<()> {
        let Some(peer) = self.peers.get_mut(&from) else {
            warn!(%from, "Screen-share candidate for unknown member ignored");
            return Ok(());
        };
        peer.add_remote_candidate(candidate).await
    }

    pub async fn on_transport_event(&mut self, event: TransportEvent) -> Result<Vec<MeshChange>> {
        let PeerKey::Mesh(conn_id) = event.key().clone() else {
            return Ok(Vec::new());
        };
        let Some(peer) = self.peers.get_mut(&conn_id) else {
            debug!(%conn_id, "Event for a closed mesh connection dropped");
            return Ok(Vec::new());
        };

        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                self.links
                    .signaling
                    .send(ClientMessage::ScreenShareIceCandidate {
                        target_id: conn_id,
                        payload: to_payload(&candidate)?,
                    })?;
                Ok(Vec::new())
            }

            TransportEvent::IceStateChanged(_, state) => {
                peer.set_ice_state(state);
                if !state.is_terminal() {
                    return Ok(Vec::new());
                }
                // A later offer from the member reopens the connection.
                warn!(%conn_id, ?state, "Mesh connection lost");
                Ok(self.remove_member(&conn_id).await)
            }

            TransportEvent::TrackAdded(_, track) => {
                if !peer.track_added(track.clone()) {
                    return Ok(Vec::new());
                }
                info!(%conn_id, track_id = %track.id, "Screen share received");
                self.remote_streams
                    .entry(conn_id.clone())
                    .or_insert_with(|| RemoteStream::new(conn_id.clone()))
                    .add(track.clone());
                Ok(vec![MeshChange::StreamAdded(conn_id, track)])
            }

            TransportEvent::TrackEnded(_, track_id) => {
                peer.track_ended(&track_id);
                Ok(self.drop_remote_track(&conn_id, &track_id).into_iter().collect())
            }
        }
    }

    /// Closes every mesh connection and stops a running share.
    pub async fn close_all(&mut self) {
        if let Some(share) = self.local_share.take() {
            share.stop();
        }
        for (_, mut peer) in std::mem::take(&mut self.peers) {
            peer.close().await;
        }
        self.remote_streams.clear();
    }

    fn drop_remote_track(&mut self, conn_id: &ConnId, track_id: &str) -> Option<MeshChange> {
        let stream = self.remote_streams.get_mut(conn_id)?;
        stream.tracks.retain(|t: &RemoteTrack| t.id != track_id);
        if !stream.tracks.is_empty() {
            return None;
        }
        self.remote_streams.remove(conn_id);
        info!(%conn_id, "Screen share ended");
        Some(MeshChange::StreamRemoved(conn_id.clone()))
    }

    async fn open_peer(&self, conn_id: &ConnId) -> Result<PeerConnectionState> {
        let key = PeerKey::Mesh(conn_id.clone());
        let transport = self
            .links
            .factory
            .create(key.clone(), self.links.transport_tx.clone())
            .await?;
        let role = self
            .local_id
            .as_ref()
            .map(|local| NegotiationRole::between(local, conn_id));
        Ok(PeerConnectionState::new(key, transport, role))
    }

    async fn offer_share(
        links: &SessionLinks,
        peer: &mut PeerConnectionState,
        target: &ConnId,
        share: &LocalStream,
    ) -> Result<()> {
        for track in share.tracks() {
            peer.attach(track).await?;
        }
        let offer = peer.create_offer().await?;
        Self::send_offer(links, target, &offer)
    }

    async fn withdraw_share(
        links: &SessionLinks,
        peer: &mut PeerConnectionState,
        target: &ConnId,
        track_ids: &[String],
    ) -> Result<()> {
        let mut removed = false;
        for track_id in track_ids {
            removed |= peer.detach(track_id).await?;
        }
        if !removed {
            return Ok(());
        }
        let offer = peer.create_offer().await?;
        Self::send_offer(links, target, &offer)
    }

    fn send_offer(links: &SessionLinks, target: &ConnId, offer: &SessionDescription) -> Result<()> {
        links.signaling.send(ClientMessage::ScreenShareOffer {
            target_id: target.clone(),
            payload: to_payload(offer)?,
        })
    }
}
