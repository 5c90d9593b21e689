pub mod config;
pub mod room;
pub mod signaling;

pub use config::*;
pub use room::*;
pub use signaling::*;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::FromRef;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub directory: RoomDirectory,
}

impl AppState {
    /// Spawns the hub. Must be called inside a tokio runtime.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            hub: Hub::spawn(config.ice_servers.clone(), config.command_buffer),
            directory: RoomDirectory::new(),
        }
    }
}

impl FromRef<AppState> for HubHandle {
    fn from_ref(state: &AppState) -> Self {
        state.hub.clone()
    }
}

impl FromRef<AppState> for RoomDirectory {
    fn from_ref(state: &AppState) -> Self {
        state.directory.clone()
    }
}

pub fn cors_layer(config: &ServerConfig) -> Result<CorsLayer> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match &config.allowed_origin {
        Some(origin) => {
            let origin = HeaderValue::from_str(origin)
                .with_context(|| format!("invalid CORS origin '{origin}'"))?;
            Ok(cors.allow_origin(origin))
        }
        None => Ok(cors.allow_origin(Any)),
    }
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/create-room", post(create_room))
        .route("/join-room", post(join_room))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// Runs the server on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let cors = cors_layer(&config)?;
    let app = router(AppState::new(&config), cors);

    info!("Signaling server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await.context("server stopped")
}
