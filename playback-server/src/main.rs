use anyhow::{Context, Result};
use clap::Parser;
use playback_core::IceServerConfig;
use playback_server::{ServerConfig, serve};
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "playback-server", about = "Room signaling server for playback calls")]
struct Args {
    /// Address to listen on.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    addr: SocketAddr,

    /// STUN/TURN urls sent to clients. Repeat for more than one.
    #[arg(long = "ice-server")]
    ice_servers: Vec<String>,

    /// Only this origin may call the HTTP endpoints from a browser.
    #[arg(long)]
    allowed_origin: Option<String>,

    /// Capacity of the hub command queue.
    #[arg(long, default_value_t = 100)]
    command_buffer: usize,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        let ice_servers = if args.ice_servers.is_empty() {
            IceServerConfig::default_stun()
        } else {
            vec![IceServerConfig {
                urls: args.ice_servers,
                username: None,
                credential: None,
            }]
        };

        Self {
            addr: args.addr,
            ice_servers,
            allowed_origin: args.allowed_origin,
            command_buffer: args.command_buffer.max(1),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playback_server=info".into()),
        )
        .init();

    let config = ServerConfig::from(Args::parse());
    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    serve(listener, config).await
}
