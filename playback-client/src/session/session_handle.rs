use crate::error::{ClientError, Result};
use crate::session::{SessionCommand, SessionSnapshot};
use tokio::sync::{mpsc, oneshot};

/// Cloneable front door to a running [`RoomSession`].
///
/// Every method fails with [`ClientError::SessionClosed`] once the session
/// loop has returned.
///
/// [`RoomSession`]: crate::session::RoomSession
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { command_tx }
    }

    pub async fn connect(&self) -> Result<()> {
        self.send(SessionCommand::Connect).await
    }

    pub async fn toggle_screen_share(&self) -> Result<()> {
        self.send(SessionCommand::ToggleScreenShare).await
    }

    pub async fn toggle_camera(&self) -> Result<()> {
        self.send(SessionCommand::ToggleCamera).await
    }

    pub async fn mute(&self) -> Result<()> {
        self.send(SessionCommand::Mute).await
    }

    pub async fn unmute(&self) -> Result<()> {
        self.send(SessionCommand::Unmute).await
    }

    pub async fn start_share(&self) -> Result<()> {
        self.send(SessionCommand::StartShare).await
    }

    pub async fn stop_share(&self) -> Result<()> {
        self.send(SessionCommand::StopShare).await
    }

    pub async fn send_chat(&self, text: impl Into<String>) -> Result<()> {
        self.send(SessionCommand::SendChat(text.into())).await
    }

    pub async fn request_members(&self) -> Result<()> {
        self.send(SessionCommand::RequestMembers).await
    }

    pub async fn inspect(&self) -> Result<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Inspect(tx)).await?;
        rx.await.map_err(|_| ClientError::SessionClosed)
    }

    pub async fn leave(&self) -> Result<()> {
        self.send(SessionCommand::Leave).await
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ClientError::SessionClosed)
    }
}
