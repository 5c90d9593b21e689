use playback_core::IceServerConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the signaling server.
    pub signaling_url: String,
    /// Used until the server's `welcome` supplies its own list.
    pub ice_servers: Vec<IceServerConfig>,
    /// Capture microphone and camera before answering a call offer.
    pub answer_with_media: bool,
    /// Report a main-call negotiation stuck for this long. `None` disables it.
    pub negotiation_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://127.0.0.1:8080/ws".to_owned(),
            ice_servers: IceServerConfig::default_stun(),
            answer_with_media: true,
            negotiation_timeout: None,
        }
    }
}
