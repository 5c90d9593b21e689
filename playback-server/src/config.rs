use playback_core::IceServerConfig;
use std::net::SocketAddr;

/// Runtime settings for the signaling server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Handed to every client in the `welcome` message.
    pub ice_servers: Vec<IceServerConfig>,
    /// `None` allows any origin.
    pub allowed_origin: Option<String>,
    /// Capacity of the hub command channel.
    pub command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            ice_servers: IceServerConfig::default_stun(),
            allowed_origin: None,
            command_buffer: 100,
        }
    }
}
