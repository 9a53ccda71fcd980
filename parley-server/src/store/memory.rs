//! In-memory store used by unit tests. Mirrors the gateway contract,
//! including username uniqueness and room-scoped message deletion, without a
//! database.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{Message, Room, Timestamp, User};
use uuid::Uuid;

use super::{Store, StoreError};

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    rooms: HashMap<Uuid, Room>,
    messages: Vec<Message>,
}

/// In-memory store gateway.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent message inserts fail, simulating an unavailable store.
    pub fn fail_message_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Seed a room directly, bypassing validation.
    pub fn put_room(&self, room: Room) {
        let mut state = self.state.lock().expect("memory store poisoned");
        state.rooms.insert(room.id, room);
    }

    pub fn message_count(&self) -> usize {
        let state = self.state.lock().expect("memory store poisoned");
        state.messages.len()
    }

    pub fn user_count(&self) -> usize {
        let state = self.state.lock().expect("memory store poisoned");
        state.users.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().expect("memory store poisoned");
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, username: &str) -> Result<User, StoreError> {
        let mut state = self.state.lock().expect("memory store poisoned");
        if state.users.iter().any(|u| u.username == username) {
            return Err(StoreError::DuplicateUsername);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let state = self.state.lock().expect("memory store poisoned");
        Ok(state.users.clone())
    }

    async fn find_room(&self, room_id: Uuid) -> Result<Option<Room>, StoreError> {
        let state = self.state.lock().expect("memory store poisoned");
        Ok(state.rooms.get(&room_id).cloned())
    }

    async fn create_room(
        &self,
        name: &str,
        owner_username: &str,
        participants: &[String],
    ) -> Result<Room, StoreError> {
        let room = Room {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_username: owner_username.to_string(),
            participant_usernames: participants.to_vec(),
            created_at: Timestamp(Utc::now()),
        };

        let mut state = self.state.lock().expect("memory store poisoned");
        state.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn list_rooms_for(&self, username: &str) -> Result<Vec<Room>, StoreError> {
        let state = self.state.lock().expect("memory store poisoned");
        Ok(state
            .rooms
            .values()
            .filter(|r| r.is_participant(username))
            .cloned()
            .collect())
    }

    async fn update_room(
        &self,
        room_id: Uuid,
        name: Option<&str>,
        participants: Option<&[String]>,
    ) -> Result<Option<Room>, StoreError> {
        let mut state = self.state.lock().expect("memory store poisoned");
        let Some(room) = state.rooms.get_mut(&room_id) else {
            return Ok(None);
        };

        if let Some(name) = name {
            room.name = name.to_string();
        }
        if let Some(participants) = participants {
            room.participant_usernames = participants.to_vec();
        }
        Ok(Some(room.clone()))
    }

    async fn delete_room(&self, room_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().expect("memory store poisoned");
        let existed = state.rooms.remove(&room_id).is_some();
        if existed {
            state.messages.retain(|m| m.room_id != room_id);
        }
        Ok(existed)
    }

    async fn add_participant(
        &self,
        room_id: Uuid,
        username: &str,
    ) -> Result<Option<Room>, StoreError> {
        let mut state = self.state.lock().expect("memory store poisoned");
        let Some(room) = state.rooms.get_mut(&room_id) else {
            return Ok(None);
        };

        if !room.is_participant(username) {
            room.participant_usernames.push(username.to_string());
        }
        Ok(Some(room.clone()))
    }

    async fn remove_participant(
        &self,
        room_id: Uuid,
        username: &str,
    ) -> Result<Option<Room>, StoreError> {
        let mut state = self.state.lock().expect("memory store poisoned");
        let Some(room) = state.rooms.get_mut(&room_id) else {
            return Ok(None);
        };

        room.participant_usernames.retain(|p| p != username);
        Ok(Some(room.clone()))
    }

    async fn insert_message(
        &self,
        room_id: Uuid,
        sender_username: &str,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Message, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }

        let message = Message {
            id: Uuid::new_v4(),
            room_id,
            sender_username: sender_username.to_string(),
            text: text.to_string(),
            created_at: Timestamp(created_at),
        };

        let mut state = self.state.lock().expect("memory store poisoned");
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, room_id: Uuid, limit: i64) -> Result<Vec<Message>, StoreError> {
        let state = self.state.lock().expect("memory store poisoned");
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        messages.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(messages)
    }

    async fn find_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<Message>, StoreError> {
        let state = self.state.lock().expect("memory store poisoned");
        Ok(state
            .messages
            .iter()
            .find(|m| m.id == message_id && m.room_id == room_id)
            .cloned())
    }

    async fn delete_message(&self, message_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().expect("memory store poisoned");
        let before = state.messages.len();
        state.messages.retain(|m| m.id != message_id);
        Ok(state.messages.len() < before)
    }
}
