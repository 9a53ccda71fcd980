//! Store gateway: typed request/response operations against the persistent
//! store for users, rooms, and messages.
//!
//! The [`Store`] trait is the seam between the messaging core and the
//! database; [`postgres::PgStore`] is the production implementation and an
//! in-memory implementation backs the engine tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{Message, Room, User};
use thiserror::Error;
use uuid::Uuid;

pub mod postgres;

#[cfg(test)]
pub mod memory;

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A username insert raced an identical one. Callers treat this as
    /// "someone else just created it" and retry as a lookup.
    #[error("username already exists")]
    DuplicateUsername,

    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Typed operations against the persistent store.
///
/// Ids and timestamps on inserts are store-assigned; participant lists keep
/// set semantics.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Look up a user by exact username.
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new user. Fails with [`StoreError::DuplicateUsername`] when
    /// the username is already taken.
    async fn create_user(&self, username: &str) -> Result<User, StoreError>;

    /// All users in the system.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Look up a room by id.
    async fn find_room(&self, room_id: Uuid) -> Result<Option<Room>, StoreError>;

    /// Create a room. `participants` must already include the owner.
    async fn create_room(
        &self,
        name: &str,
        owner_username: &str,
        participants: &[String],
    ) -> Result<Room, StoreError>;

    /// Rooms where `username` is a participant.
    async fn list_rooms_for(&self, username: &str) -> Result<Vec<Room>, StoreError>;

    /// Update name and/or participant list. `None` fields are left
    /// unchanged. Returns `None` when the room does not exist.
    async fn update_room(
        &self,
        room_id: Uuid,
        name: Option<&str>,
        participants: Option<&[String]>,
    ) -> Result<Option<Room>, StoreError>;

    /// Delete a room and all of its messages. Returns whether a room was
    /// deleted.
    async fn delete_room(&self, room_id: Uuid) -> Result<bool, StoreError>;

    /// Add a participant; a no-op when already present. Returns `None` when
    /// the room does not exist.
    async fn add_participant(
        &self,
        room_id: Uuid,
        username: &str,
    ) -> Result<Option<Room>, StoreError>;

    /// Remove a participant; a no-op when absent. Returns `None` when the
    /// room does not exist.
    async fn remove_participant(
        &self,
        room_id: Uuid,
        username: &str,
    ) -> Result<Option<Room>, StoreError>;

    /// Insert a message with a store-assigned id.
    async fn insert_message(
        &self,
        room_id: Uuid,
        sender_username: &str,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Message, StoreError>;

    /// Messages in a room, oldest first, up to `limit`.
    async fn list_messages(&self, room_id: Uuid, limit: i64) -> Result<Vec<Message>, StoreError>;

    /// Look up a message scoped to a room.
    async fn find_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<Message>, StoreError>;

    /// Delete a message. Returns whether a message was deleted.
    async fn delete_message(&self, message_id: Uuid) -> Result<bool, StoreError>;
}
