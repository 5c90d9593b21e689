use anyhow::{Context, Result, bail};
use playback_core::{ClientMessage, ConnId, RoomId, ServerMessage};
use playback_server::{Hub, HubHandle};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub fn spawn_hub() -> HubHandle {
    Hub::spawn(Vec::new(), 100)
}

pub fn room(id: &str) -> RoomId {
    RoomId::new(id).expect("valid room id")
}

/// A connection registered with the hub through a plain channel outbox.
pub struct TestConn {
    pub conn_id: ConnId,
    hub: HubHandle,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl TestConn {
    /// Registers and consumes the `welcome` message.
    pub async fn connect(hub: &HubHandle) -> Result<Self> {
        let conn_id = ConnId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.connect(conn_id.clone(), tx).await?;

        let mut conn = Self {
            conn_id,
            hub: hub.clone(),
            rx,
        };
        match conn.recv().await? {
            ServerMessage::Welcome { conn_id, .. } if conn_id == conn.conn_id => Ok(conn),
            other => bail!("expected welcome, got {:?}", other),
        }
    }

    pub async fn send(&self, message: ClientMessage) -> Result<()> {
        self.hub.submit(self.conn_id.clone(), message).await
    }

    pub async fn join(&mut self, room_id: &RoomId) -> Result<Vec<ConnId>> {
        self.send(ClientMessage::JoinRoom {
            room_id: room_id.clone(),
        })
        .await?;
        match self.recv().await? {
            ServerMessage::UsersInRoom { users, .. } => Ok(users),
            other => bail!("expected users-in-room, got {:?}", other),
        }
    }

    pub async fn offer(&self, room_id: &RoomId, payload: Value) -> Result<()> {
        self.send(ClientMessage::Offer {
            room_id: room_id.clone(),
            payload,
        })
        .await
    }

    pub async fn disconnect(self) -> Result<()> {
        self.hub.disconnect(self.conn_id).await
    }

    pub async fn recv(&mut self) -> Result<ServerMessage> {
        timeout(RECV_TIMEOUT, self.rx.recv())
            .await
            .context("timed out waiting for a server message")?
            .context("outbox closed")
    }

    /// Waits until the hub has drained every queued command, then checks that
    /// nothing was delivered.
    pub async fn assert_silent(&mut self) -> Result<()> {
        self.hub.members_of(room("__barrier__")).await?;
        match self.rx.try_recv() {
            Ok(msg) => bail!("unexpected message for {}: {:?}", self.conn_id, msg),
            Err(_) => Ok(()),
        }
    }
}
