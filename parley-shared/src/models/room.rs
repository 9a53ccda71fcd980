use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Timestamp;

/// A chat room.
///
/// The owner is fixed at creation time and always present in
/// `participant_usernames`. Participant membership is the single source of
/// truth for authorization checks; the live broadcast group is tracked
/// separately by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    /// Unique identifier for the room.
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Username of the room's owner.
    pub owner_username: String,

    /// Usernames authorized to participate. Set semantics; includes the owner.
    pub participant_usernames: Vec<String>,

    /// When the room was created.
    pub created_at: Timestamp,
}

impl Room {
    /// Whether `username` is currently authorized to participate.
    #[must_use]
    pub fn is_participant(&self, username: &str) -> bool {
        self.participant_usernames.iter().any(|p| p == username)
    }
}

/// Request body for creating a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateRoomRequest {
    /// Display name for the new room.
    pub name: String,

    /// Initial participants besides the owner. May be empty.
    #[serde(default)]
    pub participant_usernames: Vec<String>,
}

/// Request body for updating a room. Absent fields are left unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UpdateRoomRequest {
    /// New display name, if renaming.
    pub name: Option<String>,

    /// Replacement participant list. The owner is always retained.
    pub participant_usernames: Option<Vec<String>>,
}
