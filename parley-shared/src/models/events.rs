use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Message;

/// Client-to-server events carried over the realtime transport.
///
/// Inbound frames deserialize into this enum at a single boundary; everything
/// downstream operates only on the typed value. Room ids arrive as raw
/// strings and are validated server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Enter a room's broadcast group. Requires participant membership.
    JoinRoom {
        /// Target room id.
        room_id: String,
    },
    /// Leave a room's broadcast group.
    LeaveRoom {
        /// Target room id.
        room_id: String,
    },
    /// Send a text message to a room.
    SendMessage {
        /// Target room id.
        room_id: String,
        /// Message body.
        text: String,
    },
}

/// Server-to-client events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A request from this connection was rejected or failed. Delivered only
    /// to the originating connection, never broadcast.
    Error {
        /// Human-readable failure description.
        message: String,
    },
    /// The connection successfully joined a room's broadcast group.
    JoinedRoom {
        /// Room that was joined.
        room_id: Uuid,
    },
    /// The connection left a room's broadcast group.
    LeftRoom {
        /// Room that was left.
        room_id: Uuid,
    },
    /// A message was persisted to a room the connection has joined.
    NewMessage(Message),
}
