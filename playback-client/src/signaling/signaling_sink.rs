use crate::error::{ClientError, Result};
use playback_core::ClientMessage;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// Outbound half of the signaling channel, as seen by the peer managers.
pub trait SignalingSink: Send + Sync {
    fn send(&self, message: ClientMessage) -> Result<()>;
}

impl SignalingSink for mpsc::UnboundedSender<ClientMessage> {
    fn send(&self, message: ClientMessage) -> Result<()> {
        mpsc::UnboundedSender::send(self, message).map_err(|_| ClientError::SignalingClosed)
    }
}

/// Wraps a negotiation value as an opaque envelope payload.
pub fn to_payload<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
