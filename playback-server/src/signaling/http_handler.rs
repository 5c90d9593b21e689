use crate::room::{DirectoryError, RoomDirectory, RoomRecord};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use playback_core::RoomId;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_name: String,
    pub room_id: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_id: String,
    #[serde(default)]
    pub password: Option<String>,
}

pub async fn create_room(
    State(directory): State<RoomDirectory>,
    Json(request): Json<CreateRoomRequest>,
) -> (StatusCode, Json<Value>) {
    let room_id = match RoomId::new(request.room_id) {
        Ok(room_id) => room_id,
        Err(e) => {
            warn!("Rejected room creation: {}", e);
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })));
        }
    };

    let record = RoomRecord {
        room_name: request.room_name,
        room_id,
        password: request.password,
    };

    match directory.create(record) {
        Ok(room) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "room": room,
                "message": "Room created successfully",
            })),
        ),
        Err(e @ DirectoryError::AlreadyExists) => {
            info!("Room creation refused: {}", e);
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
        }
    }
}

pub async fn join_room(
    State(directory): State<RoomDirectory>,
    Json(request): Json<JoinRoomRequest>,
) -> (StatusCode, Json<Value>) {
    let admitted = RoomId::new(request.room_id)
        .is_ok_and(|room_id| directory.verify(&room_id, request.password.as_deref()));

    if admitted {
        (
            StatusCode::OK,
            Json(json!({ "success": true, "msg": "Room joined successfully" })),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Room doesn't exist" })),
        )
    }
}

pub async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
