use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use playback_core::RoomId;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Room already exists")]
    AlreadyExists,
}

/// A named room registered over HTTP. The password never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub room_name: String,
    pub room_id: RoomId,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// Rooms created through `POST /create-room`.
///
/// Independent of the signaling registry: a WebSocket client may join any
/// room id whether or not it is listed here.
#[derive(Clone, Default)]
pub struct RoomDirectory {
    rooms: Arc<DashMap<RoomId, RoomRecord>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, record: RoomRecord) -> Result<RoomRecord, DirectoryError> {
        match self.rooms.entry(record.room_id.clone()) {
            Entry::Occupied(_) => Err(DirectoryError::AlreadyExists),
            Entry::Vacant(slot) => {
                info!(room_id = %record.room_id, room_name = %record.room_name, "Room created");
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    /// Exact match on id and password. A room created without a password only
    /// accepts a request without one.
    pub fn verify(&self, room_id: &RoomId, password: Option<&str>) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|record| record.password.as_deref() == password)
    }

    pub fn get(&self, room_id: &RoomId) -> Option<RoomRecord> {
        self.rooms.get(room_id).map(|record| record.clone())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
