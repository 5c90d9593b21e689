use crate::room::hub_command::HubCommand;
use crate::room::registry::RoomRegistry;
use crate::signaling::{Outbox, Relay};
use anyhow::{Result, anyhow};
use playback_core::{ClientMessage, ConnId, IceServerConfig, RoomId, ServerMessage};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Single owner of the membership registry and the relay.
///
/// Every inbound event is a [`HubCommand`] and runs to completion before the
/// next one is taken off the channel, so registry mutations and relay dispatch
/// never interleave.
pub struct Hub {
    registry: RoomRegistry,
    relay: Relay,
    ice_servers: Vec<IceServerConfig>,
    command_rx: mpsc::Receiver<HubCommand>,
}

impl Hub {
    pub fn new(ice_servers: Vec<IceServerConfig>, command_rx: mpsc::Receiver<HubCommand>) -> Self {
        Self {
            registry: RoomRegistry::new(),
            relay: Relay::new(),
            ice_servers,
            command_rx,
        }
    }

    /// Starts the hub on the runtime and returns its front door.
    pub fn spawn(ice_servers: Vec<IceServerConfig>, buffer: usize) -> HubHandle {
        let (command_tx, command_rx) = mpsc::channel(buffer);
        let hub = Hub::new(ice_servers, command_rx);
        tokio::spawn(hub.run());
        HubHandle { command_tx }
    }

    pub async fn run(mut self) {
        info!("Hub event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }

        info!("Hub event loop finished");
    }

    fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Connect { conn_id, outbox } => self.connect(conn_id, outbox),

            HubCommand::Message { conn_id, message } => self.dispatch(conn_id, message),

            HubCommand::Disconnect { conn_id } => self.disconnect(&conn_id),

            HubCommand::MembersOf { room_id, reply } => {
                let _ = reply.send(self.registry.members_of(&room_id));
            }
        }
    }

    fn connect(&mut self, conn_id: ConnId, outbox: Outbox) {
        info!(%conn_id, "Connection registered");
        self.relay.register(conn_id.clone(), outbox);
        self.relay.unicast(
            &conn_id,
            ServerMessage::Welcome {
                conn_id: conn_id.clone(),
                ice_servers: self.ice_servers.clone(),
            },
        );
    }

    fn dispatch(&mut self, from: ConnId, message: ClientMessage) {
        debug!(%from, kind = message.kind(), "Inbound");

        match message {
            ClientMessage::JoinRoom { room_id } => self.join(from, room_id),

            ClientMessage::LeaveRoom { room_id } => {
                let Some(remaining) = self.registry.leave_room(&room_id, &from) else {
                    debug!(%from, %room_id, "Leave for a room the connection is not in");
                    return;
                };
                info!(%from, %room_id, "Left room");
                let notice = ServerMessage::UserLeft {
                    room_id,
                    conn_id: from,
                };
                self.relay.broadcast(&remaining, None, &notice);
            }

            ClientMessage::SendMsg { room_id, payload } => {
                let msg = ServerMessage::ReceiveMsg {
                    room_id: room_id.clone(),
                    from: from.clone(),
                    payload,
                };
                self.broadcast_from_member(&from, &room_id, msg);
            }

            ClientMessage::Offer { room_id, payload } => {
                let msg = ServerMessage::Offer {
                    room_id: room_id.clone(),
                    from: from.clone(),
                    payload,
                };
                self.broadcast_from_member(&from, &room_id, msg);
            }

            ClientMessage::Answer { room_id, payload } => {
                let msg = ServerMessage::Answer {
                    room_id: room_id.clone(),
                    from: from.clone(),
                    payload,
                };
                self.broadcast_from_member(&from, &room_id, msg);
            }

            ClientMessage::IceCandidate { room_id, payload } => {
                let msg = ServerMessage::IceCandidate {
                    room_id: room_id.clone(),
                    from: from.clone(),
                    payload,
                };
                self.broadcast_from_member(&from, &room_id, msg);
            }

            ClientMessage::ScreenShareOffer { target_id, payload } => {
                self.relay
                    .unicast(&target_id, ServerMessage::ScreenShareOffer { from, payload });
            }

            ClientMessage::ScreenShareAnswer { target_id, payload } => {
                self.relay
                    .unicast(&target_id, ServerMessage::ScreenShareAnswer { from, payload });
            }

            ClientMessage::ScreenShareIceCandidate { target_id, payload } => {
                self.relay.unicast(
                    &target_id,
                    ServerMessage::ScreenShareIceCandidate { from, payload },
                );
            }

            ClientMessage::GetUsersInRoom { room_id } => {
                let users = self
                    .registry
                    .members_of(&room_id)
                    .into_iter()
                    .filter(|id| id != &from)
                    .collect();
                self.relay
                    .unicast(&from, ServerMessage::UsersInRoom { room_id, users });
            }
        }
    }

    fn join(&mut self, conn_id: ConnId, room_id: RoomId) {
        let outcome = self.registry.join(&room_id, &conn_id);
        info!(%conn_id, %room_id, newly_joined = outcome.newly_joined, "Joined room");

        self.relay.unicast(
            &conn_id,
            ServerMessage::UsersInRoom {
                room_id: room_id.clone(),
                users: outcome.snapshot,
            },
        );

        if outcome.newly_joined {
            let notice = ServerMessage::UserJoined {
                room_id: room_id.clone(),
                conn_id: conn_id.clone(),
            };
            self.relay
                .broadcast_room(&self.registry, &room_id, Some(&conn_id), &notice);
        }
    }

    fn broadcast_from_member(&self, from: &ConnId, room_id: &RoomId, message: ServerMessage) {
        if !self.registry.is_member(room_id, from) {
            warn!(%from, %room_id, "Broadcast from a connection outside the room rejected");
            self.relay.unicast(
                from,
                ServerMessage::Error {
                    message: format!("not a member of room '{room_id}'"),
                },
            );
            return;
        }
        self.relay
            .broadcast_room(&self.registry, room_id, Some(from), &message);
    }

    /// Total cleanup: the connection leaves every room and every affected
    /// room hears about it before this returns.
    fn disconnect(&mut self, conn_id: &ConnId) {
        self.relay.unregister(conn_id);

        let departures = self.registry.leave(conn_id);
        for departure in &departures {
            let notice = ServerMessage::UserLeft {
                room_id: departure.room_id.clone(),
                conn_id: conn_id.clone(),
            };
            self.relay.broadcast(&departure.remaining, None, &notice);
        }

        info!(%conn_id, rooms = departures.len(), "Connection cleaned up");
    }
}

/// Cloneable front door to a running [`Hub`].
#[derive(Clone)]
pub struct HubHandle {
    command_tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    pub async fn connect(&self, conn_id: ConnId, outbox: Outbox) -> Result<()> {
        self.send(HubCommand::Connect { conn_id, outbox }).await
    }

    pub async fn submit(&self, conn_id: ConnId, message: ClientMessage) -> Result<()> {
        self.send(HubCommand::Message { conn_id, message }).await
    }

    pub async fn disconnect(&self, conn_id: ConnId) -> Result<()> {
        self.send(HubCommand::Disconnect { conn_id }).await
    }

    pub async fn members_of(&self, room_id: RoomId) -> Result<Vec<ConnId>> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::MembersOf { room_id, reply }).await?;
        rx.await.map_err(|_| anyhow!("hub dropped the reply"))
    }

    async fn send(&self, cmd: HubCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| anyhow!("hub is not running"))
    }
}
