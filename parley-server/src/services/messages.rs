//! Message history and authorized message access.

use std::sync::Arc;

use shared::models::Message;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use super::rooms::{RoomsError, RoomsService};
use crate::store::{Store, StoreError};

/// Default page size for history reads.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Largest page size a client may request.
pub const MAX_HISTORY_LIMIT: i64 = 200;

/// Errors raised by message operations.
#[derive(Debug, Error)]
pub enum MessagesError {
    /// The referenced message does not exist in the room.
    #[error("Message not found")]
    NotFound,

    /// Room lookup or authorization failed.
    #[error(transparent)]
    Rooms(#[from] RoomsError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Message service: history reads and deletion, gated on room membership.
#[derive(Clone)]
pub struct MessagesService {
    store: Arc<dyn Store>,
    rooms: RoomsService,
}

impl std::fmt::Debug for MessagesService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagesService").finish()
    }
}

impl MessagesService {
    /// Creates a new messages service.
    pub fn new(store: Arc<dyn Store>, rooms: RoomsService) -> Self {
        Self { store, rooms }
    }

    /// List a room's messages oldest-first, up to `limit`.
    ///
    /// # Errors
    /// Authorization failures from the room gate, or store failures.
    #[instrument(name = "messages.list", skip(self))]
    pub async fn list(
        &self,
        room_id: Uuid,
        username: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, MessagesError> {
        self.rooms.authorize(room_id, username).await?;

        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        Ok(self.store.list_messages(room_id, limit).await?)
    }

    /// Fetch a single message from a room.
    ///
    /// # Errors
    /// [`MessagesError::NotFound`] when absent from the room.
    #[instrument(name = "messages.get", skip(self))]
    pub async fn get(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        username: &str,
    ) -> Result<Message, MessagesError> {
        self.rooms.authorize(room_id, username).await?;

        self.store
            .find_message(room_id, message_id)
            .await?
            .ok_or(MessagesError::NotFound)
    }

    /// Delete a message. Only the sender or the room owner may delete.
    ///
    /// # Errors
    /// [`RoomsError::Forbidden`] for anyone else.
    #[instrument(name = "messages.delete", skip(self))]
    pub async fn delete(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        username: &str,
    ) -> Result<(), MessagesError> {
        let room = self.rooms.authorize(room_id, username).await?;
        let message = self
            .store
            .find_message(room_id, message_id)
            .await?
            .ok_or(MessagesError::NotFound)?;

        if message.sender_username != username && room.owner_username != username {
            return Err(MessagesError::Rooms(RoomsError::Forbidden));
        }

        if self.store.delete_message(message_id).await? {
            Ok(())
        } else {
            Err(MessagesError::NotFound)
        }
    }
}
