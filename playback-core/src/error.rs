use thiserror::Error;

/// Причины, по которым входящий конверт отклоняется на границе сервера.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("room id must not be empty")]
    EmptyRoomId,

    #[error("invalid connection id: {0}")]
    InvalidConnId(String),
}
