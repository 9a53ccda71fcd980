//! The chat engine: connection lifecycle and the message pipeline.
//!
//! Every realtime operation flows through here. The pipeline for a sent
//! message is validate, authorize against the stored participant list,
//! persist, multicast, then check for an assistant mention. Persist and
//! multicast happen under a per-room lock so subscribers observe one room's
//! messages in a single order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use shared::models::{ClientEvent, Message, Room, ServerEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::ConnectionId;
use super::hub::RoomHub;
use super::sessions::{Session, SessionRegistry};
use crate::services::assistant::AssistantService;
use crate::services::identity::IdentityService;
use crate::services::rooms::{RoomsError, RoomsService};
use crate::store::{Store, StoreError};

/// Why a realtime operation was rejected or failed.
///
/// Display strings double as the client-facing error payload.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Connection attempted without a username.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Event arrived with an empty `room_id`.
    #[error("room_id is required")]
    MissingRoomId,

    /// The `room_id` was not a valid UUID.
    #[error("Invalid room_id format")]
    InvalidRoomId,

    /// The message text was empty after trimming.
    #[error("text cannot be empty")]
    EmptyText,

    /// Room lookup or membership authorization failed.
    #[error("{0}")]
    Rooms(RoomsError),

    /// The store failed mid-operation.
    #[error("Internal server error")]
    Store(#[from] StoreError),
}

impl From<RoomsError> for EngineError {
    fn from(err: RoomsError) -> Self {
        // Store failures inside the room gate stay internal rather than
        // leaking database detail to clients.
        match err {
            RoomsError::Store(source) => Self::Store(source),
            other => Self::Rooms(other),
        }
    }
}

/// A registered connection handed back to the transport layer.
#[derive(Debug)]
pub struct ClientConnection {
    /// Identifier to pass to subsequent engine calls.
    pub id: ConnectionId,
    /// Resolved username for the connection.
    pub username: String,
    /// Stream of events addressed to this connection.
    pub events: mpsc::Receiver<ServerEvent>,
}

/// Transport-independent chat engine.
///
/// Cheap to clone; all clones share the session registry, hub, and room
/// publish locks.
#[derive(Clone)]
pub struct ChatEngine {
    store: Arc<dyn Store>,
    identity: IdentityService,
    rooms: RoomsService,
    assistant: AssistantService,
    sessions: Arc<SessionRegistry>,
    hub: Arc<RoomHub>,
    publish_locks: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
    queue_capacity: usize,
}

impl std::fmt::Debug for ChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEngine")
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl ChatEngine {
    /// Creates an engine over the given services.
    pub fn new(
        store: Arc<dyn Store>,
        identity: IdentityService,
        rooms: RoomsService,
        assistant: AssistantService,
        queue_capacity: usize,
    ) -> Self {
        Self {
            store,
            identity,
            rooms,
            assistant,
            sessions: Arc::new(SessionRegistry::new()),
            hub: Arc::new(RoomHub::new()),
            publish_locks: Arc::new(Mutex::new(HashMap::new())),
            queue_capacity,
        }
    }

    /// Accept a connection asserting `username`, resolving the user record
    /// and registering a session.
    ///
    /// # Errors
    /// [`EngineError::NotAuthenticated`] when no username is asserted.
    #[instrument(name = "engine.connect", skip(self))]
    pub async fn connect(&self, username: Option<&str>) -> Result<ClientConnection, EngineError> {
        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(EngineError::NotAuthenticated)?;

        let user = self.identity.resolve(username).await?;
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = self.sessions.register(user.username.clone(), tx).await;
        metrics::counter!("realtime_connects_total").increment(1);
        info!(connection = %id, username = %user.username, "client connected");

        Ok(ClientConnection {
            id,
            username: user.username,
            events: rx,
        })
    }

    /// Tear down a connection: drop its session and every room subscription.
    #[instrument(name = "engine.disconnect", skip(self))]
    pub async fn disconnect(&self, id: ConnectionId) {
        self.hub.purge(id).await;
        if self.sessions.unregister(id).await.is_some() {
            info!(connection = %id, "client disconnected");
        }
    }

    /// Dispatch one client event, reporting failures back to the origin
    /// connection as an error event.
    pub async fn handle_client_event(&self, id: ConnectionId, event: ClientEvent) {
        let result = match event {
            ClientEvent::JoinRoom { room_id } => self.join_room(id, &room_id).await,
            ClientEvent::LeaveRoom { room_id } => self.leave_room(id, &room_id).await,
            ClientEvent::SendMessage { room_id, text } => {
                self.send_message(id, &room_id, &text).await.map(|_| ())
            }
        };

        if let Err(err) = result {
            if let EngineError::Store(source) = &err {
                error!(connection = %id, %source, "realtime operation failed");
            }
            let reason = match &err {
                EngineError::NotAuthenticated => "not_authenticated",
                EngineError::MissingRoomId => "missing_room_id",
                EngineError::InvalidRoomId => "invalid_room_id",
                EngineError::EmptyText => "empty_text",
                EngineError::Rooms(RoomsError::NotFound) => "room_not_found",
                EngineError::Rooms(_) => "not_participant",
                EngineError::Store(_) => "store_error",
            };
            metrics::counter!("realtime_rejections_total", "reason" => reason).increment(1);
            self.send_to(id, ServerEvent::Error {
                message: err.to_string(),
            })
            .await;
        }
    }

    /// Subscribe the connection to a room it participates in.
    ///
    /// Membership is re-checked against the store on every join. Joining a
    /// room twice is a no-op.
    ///
    /// # Errors
    /// Validation, authorization, and store failures.
    #[instrument(name = "engine.join_room", skip(self))]
    pub async fn join_room(&self, id: ConnectionId, room_id: &str) -> Result<(), EngineError> {
        let session = self.session(id).await?;
        let room_id = parse_room_id(room_id)?;
        self.rooms.authorize(room_id, &session.username).await?;

        self.hub.join(room_id, id, session.sender.clone()).await;
        metrics::counter!("realtime_joins_total").increment(1);
        self.send_to(id, ServerEvent::JoinedRoom { room_id }).await;
        Ok(())
    }

    /// Unsubscribe the connection from a room. No membership check; leaving
    /// is always permitted, and leaving a room never joined is a no-op.
    ///
    /// # Errors
    /// Validation failures only.
    #[instrument(name = "engine.leave_room", skip(self))]
    pub async fn leave_room(&self, id: ConnectionId, room_id: &str) -> Result<(), EngineError> {
        self.session(id).await?;
        let room_id = parse_room_id(room_id)?;

        self.hub.leave(room_id, id).await;
        self.send_to(id, ServerEvent::LeftRoom { room_id }).await;
        Ok(())
    }

    /// Run the full message pipeline for one inbound message.
    ///
    /// On success the message has been persisted and multicast, and any
    /// assistant reply is in flight on a background task.
    ///
    /// # Errors
    /// Validation, authorization, and store failures. Nothing is persisted
    /// or broadcast on error.
    #[instrument(name = "engine.send_message", skip(self, text))]
    pub async fn send_message(
        &self,
        id: ConnectionId,
        room_id: &str,
        text: &str,
    ) -> Result<Message, EngineError> {
        let session = self.session(id).await?;
        let room_id = parse_room_id(room_id)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::EmptyText);
        }

        // Authorization happens against the stored participant list on every
        // send, independent of any earlier join.
        let room = self.rooms.authorize(room_id, &session.username).await?;
        let message = self.publish(&room, &session.username, text).await?;
        metrics::counter!("messages_sent_total").increment(1);

        if self.assistant.mentions(text) && session.username != self.assistant.sender_name() {
            self.dispatch_assistant(room, text.to_string());
        }

        Ok(message)
    }

    /// Persist and multicast one message under the room's publish lock.
    async fn publish(
        &self,
        room: &Room,
        sender_username: &str,
        text: &str,
    ) -> Result<Message, EngineError> {
        let lock = self.room_lock(room.id);
        let _guard = lock.lock().await;

        let message = self
            .store
            .insert_message(room.id, sender_username, text, Utc::now())
            .await?;
        self.hub
            .broadcast(room.id, &ServerEvent::NewMessage(message.clone()))
            .await;
        Ok(message)
    }

    /// Generate and publish an assistant reply on a background task.
    ///
    /// Replies never mention-trigger further replies: the reserved sender is
    /// excluded in [`ChatEngine::send_message`], and this path skips the
    /// mention check entirely.
    fn dispatch_assistant(&self, room: Room, text: String) {
        let engine = self.clone();
        tokio::spawn(async move {
            let reply = engine.assistant.respond(&room.name, &text).await;

            // The room may have been deleted while generating.
            match engine.store.find_room(room.id).await {
                Ok(Some(room)) => {
                    let sender = engine.assistant.sender_name().to_string();
                    if let Err(err) = engine.publish(&room, &sender, &reply).await {
                        error!(room = %room.id, %err, "failed to publish assistant reply");
                    }
                }
                Ok(None) => {
                    warn!(room = %room.id, "room deleted before assistant reply");
                }
                Err(err) => {
                    error!(room = %room.id, %err, "room lookup failed for assistant reply");
                }
            }
        });
    }

    async fn session(&self, id: ConnectionId) -> Result<Session, EngineError> {
        self.sessions.get(id).await.ok_or(EngineError::NotAuthenticated)
    }

    async fn send_to(&self, id: ConnectionId, event: ServerEvent) {
        if let Some(session) = self.sessions.get(id).await {
            // Best effort, same as room fan-out.
            let _ = session.sender.try_send(event);
        }
    }

    fn room_lock(&self, room_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.publish_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(room_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

fn parse_room_id(raw: &str) -> Result<Uuid, EngineError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(EngineError::MissingRoomId);
    }
    Uuid::parse_str(raw).map_err(|_| EngineError::InvalidRoomId)
}
