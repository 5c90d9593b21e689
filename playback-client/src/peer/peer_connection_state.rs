use crate::error::Result;
use crate::media::{LocalTrack, RemoteTrack};
use crate::peer::NegotiationRole;
use crate::transport::{IceState, PeerKey, PeerTransport, SenderId};
use playback_core::{IceCandidate, SessionDescription};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingPhase {
    Stable,
    HaveLocalOffer,
}

/// What happened to a remote offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferDisposition {
    /// Applied and answered. `rolled_back` is set when a pending local offer
    /// was discarded to make room for it.
    Answered {
        answer: SessionDescription,
        rolled_back: bool,
    },
    /// Crossed our own pending offer and lost the tie-break.
    Ignored,
}

/// Negotiation state of one connection to one remote counterpart.
///
/// All mutation goes through `&mut self`, so the owner serializes local
/// offers, remote offers and candidate handling for the connection.
pub struct PeerConnectionState {
    key: PeerKey,
    transport: Arc<dyn PeerTransport>,
    phase: SignalingPhase,
    remote_description_applied: bool,
    pending_candidates: Vec<IceCandidate>,
    senders: HashMap<String, SenderId>,
    remote_tracks: Vec<RemoteTrack>,
    role: Option<NegotiationRole>,
    ice_state: IceState,
}

impl PeerConnectionState {
    pub fn new(
        key: PeerKey,
        transport: Arc<dyn PeerTransport>,
        role: Option<NegotiationRole>,
    ) -> Self {
        Self {
            key,
            transport,
            phase: SignalingPhase::Stable,
            remote_description_applied: false,
            pending_candidates: Vec::new(),
            senders: HashMap::new(),
            remote_tracks: Vec::new(),
            role,
            ice_state: IceState::New,
        }
    }

    pub fn key(&self) -> &PeerKey {
        &self.key
    }

    pub fn phase(&self) -> SignalingPhase {
        self.phase
    }

    pub fn role(&self) -> Option<NegotiationRole> {
        self.role
    }

    pub fn set_role(&mut self, role: NegotiationRole) {
        self.role = Some(role);
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_description_applied
    }

    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn ice_state(&self) -> IceState {
        self.ice_state
    }

    pub fn set_ice_state(&mut self, state: IceState) {
        self.ice_state = state;
    }

    pub fn remote_tracks(&self) -> &[RemoteTrack] {
        &self.remote_tracks
    }

    pub fn is_attached(&self, track_id: &str) -> bool {
        self.senders.contains_key(track_id)
    }

    pub fn attached_count(&self) -> usize {
        self.senders.len()
    }

    /// Adds an outbound track. Attaching the same track twice is a no-op.
    pub async fn attach(&mut self, track: &LocalTrack) -> Result<bool> {
        if self.is_attached(track.id()) {
            return Ok(false);
        }
        let sender = self.transport.add_track(track).await?;
        self.senders.insert(track.id().to_owned(), sender);
        Ok(true)
    }

    pub async fn detach(&mut self, track_id: &str) -> Result<bool> {
        let Some(sender) = self.senders.remove(track_id) else {
            return Ok(false);
        };
        self.transport.remove_track(&sender).await?;
        Ok(true)
    }

    pub async fn create_offer(&mut self) -> Result<SessionDescription> {
        let offer = self.transport.create_offer().await?;
        self.phase = SignalingPhase::HaveLocalOffer;
        debug!(key = %self.key, "Local offer created");
        Ok(offer)
    }

    /// Applies a remote offer and produces the answer, resolving glare with
    /// the negotiation role. Without a known role a pending local offer is
    /// rolled back.
    pub async fn accept_offer(&mut self, offer: SessionDescription) -> Result<OfferDisposition> {
        let mut rolled_back = false;

        if self.phase == SignalingPhase::HaveLocalOffer {
            if self.role == Some(NegotiationRole::Proposer) {
                info!(key = %self.key, "Offer glare: keeping local offer");
                return Ok(OfferDisposition::Ignored);
            }
            info!(key = %self.key, "Offer glare: rolling back local offer");
            self.transport.rollback().await?;
            self.phase = SignalingPhase::Stable;
            rolled_back = true;
        }

        self.transport.set_remote_description(offer).await?;
        self.remote_description_applied = true;
        self.flush_candidates().await;

        let answer = self.transport.create_answer().await?;
        self.phase = SignalingPhase::Stable;

        Ok(OfferDisposition::Answered {
            answer,
            rolled_back,
        })
    }

    /// Applies a remote answer to the pending local offer. Returns `false`,
    /// and changes nothing, when no offer is pending.
    pub async fn accept_answer(&mut self, answer: SessionDescription) -> Result<bool> {
        if self.phase != SignalingPhase::HaveLocalOffer {
            warn!(key = %self.key, "Answer without a pending offer ignored");
            return Ok(false);
        }

        self.transport.set_remote_description(answer).await?;
        self.remote_description_applied = true;
        self.phase = SignalingPhase::Stable;
        self.flush_candidates().await;
        Ok(true)
    }

    /// Candidates that arrive before any remote description are queued and
    /// applied right after one is set.
    pub async fn add_remote_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        if !self.remote_description_applied {
            debug!(key = %self.key, "Buffering ICE candidate");
            self.pending_candidates.push(candidate);
            return Ok(());
        }
        self.transport.add_ice_candidate(candidate).await
    }

    async fn flush_candidates(&mut self) {
        if self.pending_candidates.is_empty() {
            return;
        }
        debug!(key = %self.key, count = self.pending_candidates.len(), "Flushing ICE candidates");

        for candidate in std::mem::take(&mut self.pending_candidates) {
            if let Err(e) = self.transport.add_ice_candidate(candidate).await {
                warn!(key = %self.key, "Failed to add buffered ICE candidate: {}", e);
            }
        }
    }

    /// Records a remote track. Returns `false` for a duplicate.
    pub fn track_added(&mut self, track: RemoteTrack) -> bool {
        if self.remote_tracks.iter().any(|t| t.id == track.id) {
            return false;
        }
        self.remote_tracks.push(track);
        true
    }

    pub fn track_ended(&mut self, track_id: &str) -> Option<RemoteTrack> {
        let index = self.remote_tracks.iter().position(|t| t.id == track_id)?;
        Some(self.remote_tracks.remove(index))
    }

    pub async fn close(&mut self) {
        if let Err(e) = self.transport.close().await {
            warn!(key = %self.key, "Failed to close transport: {}", e);
        }
        self.senders.clear();
        self.remote_tracks.clear();
        self.pending_candidates.clear();
        self.ice_state = IceState::Closed;
    }
}
