use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat user.
///
/// Identity is asserted by username only; users are created lazily on first
/// reference (connection, room creation, participant addition) and are never
/// deleted by the messaging core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique identifier for the user.
    pub id: Uuid,

    /// The user's username. Unique, case-sensitive, non-empty after trimming.
    pub username: String,
}
