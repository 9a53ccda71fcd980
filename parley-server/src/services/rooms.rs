//! Room lifecycle and the membership authorization gate.

use std::sync::Arc;

use shared::models::{CreateRoomRequest, Room, UpdateRoomRequest};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use super::identity::IdentityService;
use crate::store::{Store, StoreError};

/// Errors raised by room operations.
#[derive(Debug, Error)]
pub enum RoomsError {
    /// The referenced room does not exist.
    #[error("Room not found")]
    NotFound,

    /// The acting user is not in the room's participant list.
    #[error("Not a participant of this room")]
    NotParticipant,

    /// The acting user is not the room owner.
    #[error("Only the owner can modify this room")]
    Forbidden,

    /// The request payload failed validation.
    #[error("{0}")]
    Validation(String),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Room service: creation, mutation, and the per-operation membership check.
#[derive(Clone)]
pub struct RoomsService {
    store: Arc<dyn Store>,
    identity: IdentityService,
}

impl std::fmt::Debug for RoomsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomsService").finish()
    }
}

impl RoomsService {
    /// Creates a new rooms service over the given store.
    pub fn new(store: Arc<dyn Store>, identity: IdentityService) -> Self {
        Self { store, identity }
    }

    /// Fetch a room and verify `username` is a current participant.
    ///
    /// Authorization is re-evaluated against the stored participant list on
    /// every call; nothing is cached between operations.
    ///
    /// # Errors
    /// [`RoomsError::NotFound`] for a missing room,
    /// [`RoomsError::NotParticipant`] when the user is not in the list.
    #[instrument(name = "rooms.authorize", skip(self))]
    pub async fn authorize(&self, room_id: Uuid, username: &str) -> Result<Room, RoomsError> {
        let room = self
            .store
            .find_room(room_id)
            .await?
            .ok_or(RoomsError::NotFound)?;

        if !room.is_participant(username) {
            return Err(RoomsError::NotParticipant);
        }
        Ok(room)
    }

    /// Create a room owned by `owner_username`.
    ///
    /// The owner is always a participant, whether or not the request lists
    /// them. Other listed participants must already exist.
    ///
    /// # Errors
    /// [`RoomsError::Validation`] for an empty name or an unknown
    /// participant.
    #[instrument(name = "rooms.create", skip(self, request))]
    pub async fn create(
        &self,
        owner_username: &str,
        request: CreateRoomRequest,
    ) -> Result<Room, RoomsError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(RoomsError::Validation("name cannot be empty".into()));
        }

        let mut participants = request.participant_usernames;
        for participant in participants.iter().filter(|p| *p != owner_username) {
            self.ensure_user_exists(participant).await?;
        }
        if !participants.iter().any(|p| p == owner_username) {
            participants.insert(0, owner_username.to_string());
        }

        let room = self.store.create_room(name, owner_username, &participants).await?;
        Ok(room)
    }

    /// Fetch a room the user participates in.
    ///
    /// # Errors
    /// Same authorization failures as [`RoomsService::authorize`].
    pub async fn get(&self, room_id: Uuid, username: &str) -> Result<Room, RoomsError> {
        self.authorize(room_id, username).await
    }

    /// List the rooms `username` participates in.
    ///
    /// # Errors
    /// Only store failures.
    #[instrument(name = "rooms.list", skip(self))]
    pub async fn list_for(&self, username: &str) -> Result<Vec<Room>, RoomsError> {
        Ok(self.store.list_rooms_for(username).await?)
    }

    /// Update a room's name or participant list. Owner only.
    ///
    /// Replacement participant names that do not exist yet are created, the
    /// same as a first realtime connection would create them.
    ///
    /// # Errors
    /// [`RoomsError::Forbidden`] when the caller is not the owner.
    #[instrument(name = "rooms.update", skip(self, request))]
    pub async fn update(
        &self,
        room_id: Uuid,
        username: &str,
        request: UpdateRoomRequest,
    ) -> Result<Room, RoomsError> {
        let room = self.owned_room(room_id, username).await?;

        if let Some(name) = request.name.as_deref() {
            if name.trim().is_empty() {
                return Err(RoomsError::Validation("name cannot be empty".into()));
            }
        }

        let mut participants = request.participant_usernames;
        if let Some(list) = participants.as_mut() {
            // The owner cannot update themselves out of the room.
            if !list.iter().any(|p| p == &room.owner_username) {
                list.insert(0, room.owner_username.clone());
            }
            for participant in list.iter() {
                self.identity.resolve(participant).await?;
            }
        }

        self.store
            .update_room(room_id, request.name.as_deref(), participants.as_deref())
            .await?
            .ok_or(RoomsError::NotFound)
    }

    /// Delete a room and its messages. Owner only.
    ///
    /// # Errors
    /// [`RoomsError::Forbidden`] when the caller is not the owner.
    #[instrument(name = "rooms.delete", skip(self))]
    pub async fn delete(&self, room_id: Uuid, username: &str) -> Result<(), RoomsError> {
        self.owned_room(room_id, username).await?;

        if self.store.delete_room(room_id).await? {
            Ok(())
        } else {
            Err(RoomsError::NotFound)
        }
    }

    /// Add a participant to a room. Owner only; adding an existing
    /// participant is a no-op. The user must already exist.
    ///
    /// # Errors
    /// [`RoomsError::Forbidden`] when the caller is not the owner,
    /// [`RoomsError::Validation`] for an unknown user.
    #[instrument(name = "rooms.add_participant", skip(self))]
    pub async fn add_participant(
        &self,
        room_id: Uuid,
        username: &str,
        participant: &str,
    ) -> Result<Room, RoomsError> {
        self.owned_room(room_id, username).await?;
        self.ensure_user_exists(participant).await?;

        self.store
            .add_participant(room_id, participant)
            .await?
            .ok_or(RoomsError::NotFound)
    }

    /// Remove a participant from a room. Owner only; the owner cannot be
    /// removed.
    ///
    /// # Errors
    /// [`RoomsError::Validation`] when targeting the owner.
    #[instrument(name = "rooms.remove_participant", skip(self))]
    pub async fn remove_participant(
        &self,
        room_id: Uuid,
        username: &str,
        participant: &str,
    ) -> Result<Room, RoomsError> {
        let room = self.owned_room(room_id, username).await?;

        if participant == room.owner_username {
            return Err(RoomsError::Validation("cannot remove the room owner".into()));
        }

        self.store
            .remove_participant(room_id, participant)
            .await?
            .ok_or(RoomsError::NotFound)
    }

    async fn ensure_user_exists(&self, username: &str) -> Result<(), RoomsError> {
        if self.store.find_user(username).await?.is_none() {
            return Err(RoomsError::Validation(format!(
                "user '{username}' does not exist"
            )));
        }
        Ok(())
    }

    async fn owned_room(&self, room_id: Uuid, username: &str) -> Result<Room, RoomsError> {
        let room = self.authorize(room_id, username).await?;
        if room.owner_username != username {
            return Err(RoomsError::Forbidden);
        }
        Ok(room)
    }
}
