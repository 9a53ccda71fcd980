use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Timestamp;

/// Reserved sender name for generated assistant replies. Not a real
/// registered user.
pub const ASSISTANT_USERNAME: &str = "AI";

/// A persisted chat message. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique identifier, assigned by the store.
    pub id: Uuid,

    /// Room the message was sent to.
    pub room_id: Uuid,

    /// Username of the sender, or [`ASSISTANT_USERNAME`] for generated replies.
    pub sender_username: String,

    /// Message body. Non-empty after trimming.
    pub text: String,

    /// Server-assigned creation time. Sender-supplied timestamps are never
    /// trusted.
    pub created_at: Timestamp,
}
