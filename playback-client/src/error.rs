use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Ошибки клиентской части: транспорт WebRTC, сигнальный канал и разбор полезной нагрузки.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("webrtc: {0}")]
    Rtc(#[from] webrtc::Error),

    #[error("signaling channel closed")]
    SignalingClosed,

    #[error("websocket: {0}")]
    WebSocket(#[from] Box<tungstenite::Error>),

    #[error("payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("session is not running")]
    SessionClosed,

    #[error("transport: {0}")]
    Transport(String),
}

impl From<tungstenite::Error> for ClientError {
    fn from(e: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
