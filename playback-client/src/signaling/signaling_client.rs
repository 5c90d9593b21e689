use crate::error::{ClientError, Result};
use crate::signaling::SignalingSink;
use futures::{SinkExt, StreamExt};
use playback_core::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// WebSocket connection to the signaling server.
///
/// Outbound envelopes are queued and written by a background task; inbound
/// frames are parsed and delivered on the receiver returned by [`connect`].
/// The receiver closes when the socket does.
///
/// [`connect`]: SignalingClient::connect
pub struct SignalingClient {
    outbound: mpsc::UnboundedSender<ClientMessage>,
}

impl SignalingClient {
    pub async fn connect(
        url: &str,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<ServerMessage>)> {
        let (stream, _) = connect_async(url).await?;
        info!(%url, "Signaling connected");

        let (mut write, mut read) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to serialize {}: {}", message.kind(), e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    warn!("Signaling write failed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerMessage>(text.as_str()) {
                            Ok(message) => {
                                if inbound_tx.send(message).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Invalid server message: {}", e),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Signaling read failed: {}", e);
                        break;
                    }
                }
            }
            debug!("Signaling reader finished");
        });

        Ok((Arc::new(Self { outbound }), inbound_rx))
    }
}

impl SignalingSink for SignalingClient {
    fn send(&self, message: ClientMessage) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| ClientError::SignalingClosed)
    }
}
