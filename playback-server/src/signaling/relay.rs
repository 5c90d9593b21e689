use crate::room::RoomRegistry;
use playback_core::{ConnId, RoomId, ServerMessage};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Stateless forwarding over the connected outboxes.
///
/// Delivery is at-most-once: there is no acknowledgement and no retry, and a
/// message addressed to a connection that is gone is dropped without telling
/// the sender. Per-recipient order is the order of the calls.
#[derive(Debug, Default)]
pub struct Relay {
    outboxes: HashMap<ConnId, Outbox>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, conn_id: ConnId, outbox: Outbox) {
        self.outboxes.insert(conn_id, outbox);
    }

    pub fn unregister(&mut self, conn_id: &ConnId) -> bool {
        self.outboxes.remove(conn_id).is_some()
    }

    pub fn is_connected(&self, conn_id: &ConnId) -> bool {
        self.outboxes.contains_key(conn_id)
    }

    /// Delivers to exactly one connection. Returns `false` when the target is
    /// stale.
    pub fn unicast(&self, target: &ConnId, message: ServerMessage) -> bool {
        let Some(outbox) = self.outboxes.get(target) else {
            debug!(%target, "Dropping message for disconnected target");
            return false;
        };
        if outbox.send(message).is_err() {
            debug!(%target, "Outbox closed, message dropped");
            return false;
        }
        true
    }

    /// Delivers to every listed member except `except`. Returns how many
    /// outboxes accepted the message.
    pub fn broadcast<'a>(
        &self,
        members: impl IntoIterator<Item = &'a ConnId>,
        except: Option<&ConnId>,
        message: &ServerMessage,
    ) -> usize {
        members
            .into_iter()
            .filter(|id| Some(*id) != except)
            .filter(|id| self.unicast(id, message.clone()))
            .count()
    }

    /// Resolves the room through the registry and broadcasts to its current
    /// members.
    pub fn broadcast_room(
        &self,
        registry: &RoomRegistry,
        room_id: &RoomId,
        except: Option<&ConnId>,
        message: &ServerMessage,
    ) -> usize {
        let members = registry.members_of(room_id);
        let delivered = self.broadcast(&members, except, message);
        debug!(%room_id, delivered, "Broadcast");
        delivered
    }
}
