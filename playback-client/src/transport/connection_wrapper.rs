use crate::error::Result;
use crate::media::{LocalTrack, RemoteTrack, TrackKind, synthetic_frame};
use crate::transport::{
    IceState, PeerKey, PeerTransport, SenderId, TransportConfig, TransportEvent, TransportFactory,
};
use async_trait::async_trait;
use bytes::Bytes;
use playback_core::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, error, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// [`TransportFactory`] backed by webrtc-rs.
#[derive(Default)]
pub struct RtcTransportFactory {
    config: RwLock<TransportConfig>,
}

impl RtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }
}

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        key: PeerKey,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        let config = self.config.read().await.clone();
        let transport = ConnectionWrapper::new(key, config, events).await?;
        Ok(Arc::new(transport))
    }

    async fn set_ice_servers(&self, ice_servers: Vec<IceServerConfig>) {
        if ice_servers.is_empty() {
            return;
        }
        self.config.write().await.ice_servers = ice_servers;
    }
}

struct AttachedSender {
    rtp_sender: Arc<RTCRtpSender>,
    /// Cleared on detach; the sample pump stops on it.
    attached: Arc<AtomicBool>,
}

pub struct ConnectionWrapper {
    pub key: PeerKey,
    pub peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<SenderId, AttachedSender>>,
    closed: Arc<AtomicBool>,
}

impl ConnectionWrapper {
    /// Инициализация нового WebRTC соединения.
    /// events: канал, в который транспорт "выплевывает" события для цикла сессии.
    pub async fn new(
        key: PeerKey,
        config: TransportConfig,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: server.urls,
                    username: server.username.unwrap_or_default(),
                    credential: server.credential.unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);
        let closed = Arc::new(AtomicBool::new(false));

        // Callbacks go quiet once the wrapper is closed.

        let ice_tx = events.clone();
        let ice_key = key.clone();
        let ice_closed = closed.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let key = ice_key.clone();
            let closed = ice_closed.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                if closed.load(Ordering::SeqCst) {
                    return;
                }
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                };
                let _ = tx.send(TransportEvent::CandidateGenerated(key, candidate));
            })
        }));

        let state_tx = events.clone();
        let state_key = key.clone();
        let state_closed = closed.clone();
        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                let tx = state_tx.clone();
                let key = state_key.clone();
                let closed = state_closed.clone();

                Box::pin(async move {
                    info!(%key, "ICE connection state changed: {}", s);
                    if closed.load(Ordering::SeqCst) {
                        return;
                    }
                    let Some(state) = ice_state(s) else { return };
                    let _ = tx.send(TransportEvent::IceStateChanged(key, state));
                })
            },
        ));

        let track_tx = events;
        let track_key = key.clone();
        let track_closed = closed.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let key = track_key.clone();
                let closed = track_closed.clone();

                Box::pin(async move {
                    let remote = RemoteTrack {
                        id: track.id(),
                        stream_id: track.stream_id(),
                        kind: match track.kind() {
                            RTPCodecType::Audio => TrackKind::Audio,
                            _ => TrackKind::Video,
                        },
                    };
                    debug!(%key, track_id = %remote.id, "Remote track arrived");

                    let track_id = remote.id.clone();
                    let _ = tx.send(TransportEvent::TrackAdded(key.clone(), remote));

                    // The track is over when its RTP stream stops.
                    tokio::spawn(async move {
                        while track.read_rtp().await.is_ok() {}
                        if !closed.load(Ordering::SeqCst) {
                            debug!(%key, %track_id, "Remote track ended");
                            let _ = tx.send(TransportEvent::TrackEnded(key, track_id));
                        }
                    });
                })
            },
        ));

        Ok(Self {
            key,
            peer_connection,
            senders: Mutex::new(HashMap::new()),
            closed,
        })
    }
}

#[async_trait]
impl PeerTransport for ConnectionWrapper {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let desc = match description.kind {
            SdpKind::Offer => RTCSessionDescription::offer(description.sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(description.sdp)?,
        };
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let Some(pending) = self.peer_connection.pending_local_description().await else {
            return Ok(());
        };
        // webrtc-rs parses the body even for a rollback.
        let rollback: RTCSessionDescription =
            serde_json::from_value(json!({ "type": "rollback", "sdp": pending.sdp }))?;
        self.peer_connection.set_local_description(rollback).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            ..Default::default()
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn add_track(&self, track: &LocalTrack) -> Result<SenderId> {
        let capability = match track.kind() {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        };
        let sample_track = Arc::new(TrackLocalStaticSample::new(
            capability,
            track.id().to_owned(),
            track.stream_id().to_owned(),
        ));

        let rtp_sender = self
            .peer_connection
            .add_track(sample_track.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // RTCP has to be drained for the interceptors to work.
        let rtcp_sender = rtp_sender.clone();
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut rtcp_buf).await.is_ok() {}
        });

        let attached = Arc::new(AtomicBool::new(true));
        tokio::spawn(pump_samples(
            self.key.clone(),
            track.clone(),
            sample_track,
            attached.clone(),
            self.closed.clone(),
        ));

        let id = SenderId(track.id().to_owned());
        self.senders.lock().await.insert(
            id.clone(),
            AttachedSender {
                rtp_sender,
                attached,
            },
        );
        debug!(key = %self.key, track_id = track.id(), "Local track attached");
        Ok(id)
    }

    async fn remove_track(&self, sender: &SenderId) -> Result<()> {
        let Some(entry) = self.senders.lock().await.remove(sender) else {
            return Ok(());
        };
        entry.attached.store(false, Ordering::SeqCst);
        self.peer_connection.remove_track(&entry.rtp_sender).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.peer_connection.close().await {
            error!(key = %self.key, "Failed to close peer connection: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpStep {
    Send,
    /// Muted: keep the clock running, send nothing.
    Hold,
    Stop,
}

fn next_step(track: &LocalTrack, attached: &AtomicBool, closed: &AtomicBool) -> PumpStep {
    if !track.is_live() || !attached.load(Ordering::SeqCst) || closed.load(Ordering::SeqCst) {
        return PumpStep::Stop;
    }
    if !track.is_enabled() {
        return PumpStep::Hold;
    }
    PumpStep::Send
}

/// Feeds a sender with the track's frames at its frame rate until the track
/// ends, is detached, or the connection closes.
async fn pump_samples(
    key: PeerKey,
    track: LocalTrack,
    output: Arc<TrackLocalStaticSample>,
    attached: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
) {
    let (frame, duration) = synthetic_frame(track.kind());
    let data = Bytes::from_static(frame);
    let mut ticker = tokio::time::interval(duration);

    loop {
        ticker.tick().await;
        match next_step(&track, &attached, &closed) {
            PumpStep::Stop => break,
            PumpStep::Hold => continue,
            PumpStep::Send => {}
        }

        let sample = Sample {
            data: data.clone(),
            duration,
            ..Default::default()
        };
        if let Err(e) = output.write_sample(&sample).await {
            warn!(%key, track_id = track.id(), "Failed to write sample: {}", e);
            break;
        }
    }
    debug!(%key, track_id = track.id(), "Sample pump stopped");
}

fn ice_state(state: RTCIceConnectionState) -> Option<IceState> {
    match state {
        RTCIceConnectionState::New => Some(IceState::New),
        RTCIceConnectionState::Checking => Some(IceState::Checking),
        RTCIceConnectionState::Connected => Some(IceState::Connected),
        RTCIceConnectionState::Completed => Some(IceState::Completed),
        RTCIceConnectionState::Disconnected => Some(IceState::Disconnected),
        RTCIceConnectionState::Failed => Some(IceState::Failed),
        RTCIceConnectionState::Closed => Some(IceState::Closed),
        _ => None,
    }
}
