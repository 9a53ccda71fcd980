//! Room fan-out: tracks which connections subscribe to which rooms and
//! multicasts events to them.

use std::collections::HashMap;

use shared::models::ServerEvent;
use tokio::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use super::ConnectionId;

/// Per-room subscription table.
///
/// Delivery is best-effort: a subscriber with a full or closed queue is
/// skipped for that event, and closed queues are pruned on the spot. Empty
/// rooms are removed from the table so idle rooms hold no memory.
#[derive(Debug, Default)]
pub struct RoomHub {
    rooms: RwLock<HashMap<Uuid, HashMap<ConnectionId, mpsc::Sender<ServerEvent>>>>,
}

impl RoomHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a room. Re-joining is a no-op.
    pub async fn join(&self, room_id: Uuid, id: ConnectionId, sender: mpsc::Sender<ServerEvent>) {
        let mut rooms = self.rooms.write().await;
        rooms.entry(room_id).or_default().insert(id, sender);
        debug!(room = %room_id, connection = %id, "joined room");
    }

    /// Unsubscribe a connection from a room. Unknown pairs are a no-op.
    pub async fn leave(&self, room_id: Uuid, id: ConnectionId) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(&room_id) {
            members.remove(&id);
            if members.is_empty() {
                rooms.remove(&room_id);
            }
            debug!(room = %room_id, connection = %id, "left room");
        }
    }

    /// Drop a connection from every room it joined.
    pub async fn purge(&self, id: ConnectionId) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
    }

    /// Multicast an event to every subscriber of a room.
    ///
    /// Returns the number of queues the event was placed on.
    pub async fn broadcast(&self, room_id: Uuid, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let rooms = self.rooms.read().await;
            let Some(members) = rooms.get(&room_id) else {
                return 0;
            };

            for (id, sender) in members {
                match sender.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        trace!(room = %room_id, connection = %id, "queue full, event dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut rooms = self.rooms.write().await;
            if let Some(members) = rooms.get_mut(&room_id) {
                for id in closed {
                    members.remove(&id);
                }
                if members.is_empty() {
                    rooms.remove(&room_id);
                }
            }
        }

        delivered
    }

    /// Number of subscribers in a room.
    pub async fn member_count(&self, room_id: Uuid) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(&room_id).map_or(0, HashMap::len)
    }
}
