use playback_core::{ConnId, RoomId};
use std::collections::{BTreeSet, HashMap};

/// Result of adding a connection to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Members present before the join, never including the joiner.
    pub snapshot: Vec<ConnId>,
    /// `false` when the connection was already a member.
    pub newly_joined: bool,
}

/// A room the departing connection belonged to, with whoever is still inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_id: RoomId,
    pub remaining: Vec<ConnId>,
}

/// In-memory map of room id to member connections.
///
/// Rooms are created on first join and never removed; an empty member set is
/// a valid state. A reverse index keeps disconnect cleanup proportional to the
/// number of rooms the connection is in.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, BTreeSet<ConnId>>,
    memberships: HashMap<ConnId, BTreeSet<RoomId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, room_id: &RoomId, conn_id: &ConnId) -> JoinOutcome {
        let members = self.rooms.entry(room_id.clone()).or_default();

        let snapshot = members
            .iter()
            .filter(|id| *id != conn_id)
            .cloned()
            .collect();
        let newly_joined = members.insert(conn_id.clone());

        self.memberships
            .entry(conn_id.clone())
            .or_default()
            .insert(room_id.clone());

        JoinOutcome {
            snapshot,
            newly_joined,
        }
    }

    /// Removes the connection from one room. Returns the remaining members, or
    /// `None` if it was not a member.
    pub fn leave_room(&mut self, room_id: &RoomId, conn_id: &ConnId) -> Option<Vec<ConnId>> {
        let members = self.rooms.get_mut(room_id)?;
        if !members.remove(conn_id) {
            return None;
        }

        if let Some(rooms) = self.memberships.get_mut(conn_id) {
            rooms.remove(room_id);
            if rooms.is_empty() {
                self.memberships.remove(conn_id);
            }
        }

        Some(members.iter().cloned().collect())
    }

    /// Removes the connection from every room it belonged to.
    pub fn leave(&mut self, conn_id: &ConnId) -> Vec<Departure> {
        let Some(rooms) = self.memberships.remove(conn_id) else {
            return Vec::new();
        };

        rooms
            .into_iter()
            .filter_map(|room_id| {
                let members = self.rooms.get_mut(&room_id)?;
                members.remove(conn_id);
                Some(Departure {
                    remaining: members.iter().cloned().collect(),
                    room_id,
                })
            })
            .collect()
    }

    pub fn members_of(&self, room_id: &RoomId) -> Vec<ConnId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, conn_id: &ConnId) -> Vec<RoomId> {
        self.memberships
            .get(conn_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, room_id: &RoomId, conn_id: &ConnId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| members.contains(conn_id))
    }

    pub fn room_exists(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }
}
