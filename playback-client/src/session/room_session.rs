use crate::call::{CallPhase, PeerConnectionManager, ToggleOutcome};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::media::{MediaDevices, TrackSource};
use crate::mesh::{MeshChange, ScreenShareMesh};
use crate::peer::SessionLinks;
use crate::session::{ClientEvent, SessionCommand, SessionHandle, SessionSnapshot};
use crate::signaling::{SignalingClient, SignalingSink};
use crate::transport::{
    PeerKey, RtcTransportFactory, TransportConfig, TransportEvent, TransportFactory,
};
use playback_core::{ClientMessage, ConnId, RoomId, ServerMessage};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 64;

/// One client's presence in one room.
///
/// Owns the main-call manager and the screen-share mesh and drives both from a
/// single loop, so inbound signaling, transport callbacks and application
/// commands never interleave.
pub struct RoomSession {
    room_id: RoomId,
    config: ClientConfig,
    links: SessionLinks,
    call: PeerConnectionManager,
    mesh: ScreenShareMesh,
    local_id: Option<ConnId>,
    members: BTreeSet<ConnId>,
    signal_rx: mpsc::UnboundedReceiver<ServerMessage>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    command_rx: mpsc::Receiver<SessionCommand>,
    event_tx: mpsc::UnboundedSender<ClientEvent>,
}

impl RoomSession {
    pub fn new(
        room_id: RoomId,
        config: ClientConfig,
        signaling: Arc<dyn SignalingSink>,
        signal_rx: mpsc::UnboundedReceiver<ServerMessage>,
        factory: Arc<dyn TransportFactory>,
        devices: Arc<dyn MediaDevices>,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<ClientEvent>) {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let links = SessionLinks {
            room_id: room_id.clone(),
            signaling,
            factory,
            devices,
            transport_tx,
        };

        let session = Self {
            room_id,
            call: PeerConnectionManager::new(links.clone(), config.answer_with_media),
            mesh: ScreenShareMesh::new(links.clone()),
            config,
            links,
            local_id: None,
            members: BTreeSet::new(),
            signal_rx,
            transport_rx,
            command_rx,
            event_tx,
        };

        (session, SessionHandle::new(command_tx), event_rx)
    }

    /// Opens the signaling WebSocket and builds a session on webrtc-rs.
    pub async fn connect(
        room_id: RoomId,
        config: ClientConfig,
        devices: Arc<dyn MediaDevices>,
    ) -> Result<(Self, SessionHandle, mpsc::UnboundedReceiver<ClientEvent>)> {
        let (signaling, signal_rx) = SignalingClient::connect(&config.signaling_url).await?;
        let factory = Arc::new(RtcTransportFactory::new(TransportConfig {
            ice_servers: config.ice_servers.clone(),
        }));
        Ok(Self::new(
            room_id, config, signaling, signal_rx, factory, devices,
        ))
    }

    pub async fn run(mut self) {
        info!(room_id = %self.room_id, "Room session started");

        self.links
            .factory
            .set_ice_servers(self.config.ice_servers.clone())
            .await;

        let join = ClientMessage::JoinRoom {
            room_id: self.room_id.clone(),
        };
        if let Err(e) = self.links.signaling.send(join) {
            warn!("Failed to join room: {}", e);
            self.shutdown(false).await;
            return;
        }

        let stall_timeout = self.config.negotiation_timeout;
        let period = stall_timeout.map_or(Duration::from_secs(1), |t| {
            (t / 2).max(Duration::from_millis(10))
        });
        let mut stall_tick = tokio::time::interval(period);
        stall_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut leave = false;
        loop {
            let phase_before = self.call.phase();

            tokio::select! {
                msg = self.signal_rx.recv() => {
                    match msg {
                        Some(m) => {
                            if let Err(e) = self.handle_server_message(m).await {
                                warn!("Failed to handle server message: {}", e);
                            }
                        }
                        None => {
                            info!("Signaling channel closed. Shutting down session.");
                            break;
                        }
                    }
                }

                evt = self.transport_rx.recv() => {
                    let Some(e) = evt else {
                        warn!("Transport channel closed unexpectedly");
                        break;
                    };
                    if let Err(e) = self.handle_transport_event(e).await {
                        warn!("Failed to handle transport event: {}", e);
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Leave) | None => {
                            leave = true;
                            break;
                        }
                        Some(c) => {
                            if let Err(e) = self.handle_command(c).await {
                                warn!("Session command failed: {}", e);
                            }
                        }
                    }
                }

                _ = stall_tick.tick(), if stall_timeout.is_some() => {
                    if let Some(timeout) = stall_timeout
                        && self.call.negotiation_stalled(timeout)
                    {
                        self.emit(ClientEvent::NegotiationStalled);
                    }
                }
            }

            self.emit_phase_change(phase_before);
        }

        self.shutdown(leave).await;
        info!(room_id = %self.room_id, "Room session finished");
    }

    async fn handle_server_message(&mut self, msg: ServerMessage) -> Result<()> {
        match msg {
            ServerMessage::Welcome {
                conn_id,
                ice_servers,
            } => {
                info!(%conn_id, "Welcomed by signaling server");
                self.local_id = Some(conn_id.clone());
                self.call.set_local_id(conn_id.clone());
                self.mesh.set_local_id(conn_id.clone());
                self.links.factory.set_ice_servers(ice_servers).await;
                self.emit(ClientEvent::Welcome(conn_id));
            }

            ServerMessage::UsersInRoom { room_id, users } => {
                if room_id != self.room_id {
                    return Ok(());
                }
                for conn_id in &users {
                    if self.local_id.as_ref() == Some(conn_id) {
                        continue;
                    }
                    if self.members.insert(conn_id.clone()) {
                        self.mesh.add_member(conn_id.clone()).await?;
                    }
                }
                self.emit(ClientEvent::RoomSnapshot(users));
            }

            ServerMessage::UserJoined { room_id, conn_id } => {
                if room_id != self.room_id {
                    return Ok(());
                }
                info!(%conn_id, "Member joined");
                self.members.insert(conn_id.clone());
                self.mesh.add_member(conn_id.clone()).await?;
                self.emit(ClientEvent::MemberJoined(conn_id));
            }

            ServerMessage::UserLeft { room_id, conn_id } => {
                if room_id != self.room_id {
                    return Ok(());
                }
                info!(%conn_id, "Member left");
                self.members.remove(&conn_id);
                self.call.handle_member_left(&conn_id).await;
                for change in self.mesh.remove_member(&conn_id).await {
                    self.emit_mesh_change(change);
                }
                self.emit(ClientEvent::MemberLeft(conn_id));
            }

            ServerMessage::ReceiveMsg {
                room_id,
                from,
                payload,
            } => {
                if room_id == self.room_id {
                    self.emit(ClientEvent::Chat { from, payload });
                }
            }

            ServerMessage::Offer {
                room_id,
                from,
                payload,
            } if room_id == self.room_id => {
                let offer = serde_json::from_value(payload)?;
                self.call.handle_remote_offer(offer, from).await?;
            }

            ServerMessage::Answer {
                room_id,
                from,
                payload,
            } if room_id == self.room_id => {
                let answer = serde_json::from_value(payload)?;
                self.call.handle_remote_answer(answer, from).await?;
            }

            ServerMessage::IceCandidate {
                room_id,
                from,
                payload,
            } if room_id == self.room_id => {
                let candidate = serde_json::from_value(payload)?;
                self.call.handle_remote_ice_candidate(candidate, from).await?;
            }

            ServerMessage::Offer { room_id, .. }
            | ServerMessage::Answer { room_id, .. }
            | ServerMessage::IceCandidate { room_id, .. } => {
                debug!(%room_id, "Call signaling for another room ignored");
            }

            ServerMessage::ScreenShareOffer { from, payload } => {
                let offer = serde_json::from_value(payload)?;
                self.mesh.handle_offer(offer, from).await?;
            }

            ServerMessage::ScreenShareAnswer { from, payload } => {
                let answer = serde_json::from_value(payload)?;
                self.mesh.handle_answer(answer, from).await?;
            }

            ServerMessage::ScreenShareIceCandidate { from, payload } => {
                let candidate = serde_json::from_value(payload)?;
                self.mesh.handle_candidate(candidate, from).await?;
            }

            ServerMessage::Error { message } => {
                warn!(%message, "Signaling server reported an error");
                self.emit(ClientEvent::ServerError(message));
            }
        }
        Ok(())
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) -> Result<()> {
        if *event.key() == PeerKey::Main {
            return self.call.on_transport_event(event).await;
        }
        for change in self.mesh.on_transport_event(event).await? {
            self.emit_mesh_change(change);
        }
        Ok(())
    }

    async fn handle_command(&mut self, cmd: SessionCommand) -> Result<()> {
        match cmd {
            SessionCommand::Connect => {
                if !self.call.connect().await? {
                    self.emit(ClientEvent::CaptureDenied(vec![
                        TrackSource::Microphone,
                        TrackSource::Camera,
                    ]));
                }
            }

            SessionCommand::ToggleScreenShare => {
                if self.call.toggle_screen_share().await? == ToggleOutcome::Denied {
                    self.emit(ClientEvent::CaptureDenied(vec![TrackSource::Screen]));
                }
            }

            SessionCommand::ToggleCamera => {
                if self.call.toggle_camera().await? == ToggleOutcome::Denied {
                    self.emit(ClientEvent::CaptureDenied(vec![TrackSource::Camera]));
                }
            }

            SessionCommand::Mute => {
                self.call.mute();
            }

            SessionCommand::Unmute => {
                self.call.unmute();
            }

            SessionCommand::StartShare => {
                if !self.mesh.start_share().await? {
                    self.emit(ClientEvent::CaptureDenied(vec![TrackSource::Screen]));
                }
            }

            SessionCommand::StopShare => self.mesh.stop_share().await,

            SessionCommand::SendChat(text) => {
                self.links.signaling.send(ClientMessage::SendMsg {
                    room_id: self.room_id.clone(),
                    payload: Value::String(text),
                })?;
            }

            SessionCommand::RequestMembers => {
                self.links.signaling.send(ClientMessage::GetUsersInRoom {
                    room_id: self.room_id.clone(),
                })?;
            }

            SessionCommand::Inspect(reply) => {
                let _ = reply.send(self.snapshot());
            }

            // Handled by the loop itself.
            SessionCommand::Leave => {}
        }
        Ok(())
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            local_id: self.local_id.clone(),
            members: self.members.iter().cloned().collect(),
            call_phase: self.call.phase(),
            call_remote: self.call.remote_id().cloned(),
            audio_enabled: self.call.audio_enabled(),
            call_tracks: self
                .call
                .peer()
                .map(|p| p.remote_tracks().to_vec())
                .unwrap_or_default(),
            mesh_peers: self.mesh.peer_ids(),
            share_streams: self.mesh.remote_streams().clone(),
            sharing: self.mesh.is_sharing(),
        }
    }

    async fn shutdown(&mut self, leave: bool) {
        let phase_before = self.call.phase();

        if leave {
            let msg = ClientMessage::LeaveRoom {
                room_id: self.room_id.clone(),
            };
            if let Err(e) = self.links.signaling.send(msg) {
                debug!("Leave notice not sent: {}", e);
            }
        }

        self.call.close().await;
        self.mesh.close_all().await;
        self.members.clear();

        self.emit_phase_change(phase_before);
        self.emit(ClientEvent::Closed);
    }

    fn emit_phase_change(&self, before: CallPhase) {
        let now = self.call.phase();
        if now != before {
            debug!(?before, ?now, "Call phase changed");
            self.emit(ClientEvent::CallPhaseChanged(now));
        }
    }

    fn emit_mesh_change(&self, change: MeshChange) {
        match change {
            MeshChange::StreamAdded(from, track) => {
                self.emit(ClientEvent::ShareStreamAdded(from, track))
            }
            MeshChange::StreamRemoved(from) => self.emit(ClientEvent::ShareStreamRemoved(from)),
            MeshChange::PeerRemoved(conn_id) => debug!(%conn_id, "Mesh peer removed"),
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.event_tx.send(event);
    }
}
