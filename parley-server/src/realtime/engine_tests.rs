//! Behavioral tests for the chat engine, run against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use shared::config::Config;
use shared::models::{ClientEvent, Room, ServerEvent, Timestamp};
use tokio::time::timeout;
use uuid::Uuid;

use super::engine::{ChatEngine, ClientConnection, EngineError};
use crate::services::assistant::{AssistantError, AssistantService, GenerationBackend};
use crate::services::identity::IdentityService;
use crate::services::rooms::{RoomsError, RoomsService};
use crate::store::Store;
use crate::store::memory::MemoryStore;

struct StubBackend {
    reply: String,
    delay: Duration,
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, AssistantError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.clone())
    }
}

struct FailingBackend;

#[async_trait]
impl GenerationBackend for FailingBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, AssistantError> {
        Err(AssistantError::EmptyResponse)
    }
}

fn engine_with(backend: Arc<dyn GenerationBackend>) -> (Arc<MemoryStore>, ChatEngine) {
    let store = Arc::new(MemoryStore::new());
    let identity = IdentityService::new(store.clone());
    let rooms = RoomsService::new(store.clone(), identity.clone());
    let config = Config::with_defaults();
    let assistant = AssistantService::new(backend, &config.assistant).unwrap();
    let engine = ChatEngine::new(store.clone(), identity, rooms, assistant, 64);
    (store, engine)
}

fn quick_engine() -> (Arc<MemoryStore>, ChatEngine) {
    engine_with(Arc::new(StubBackend {
        reply: "stub".into(),
        delay: Duration::ZERO,
    }))
}

fn seed_room(store: &MemoryStore, participants: &[&str]) -> Uuid {
    let room = Room {
        id: Uuid::new_v4(),
        name: "general".into(),
        owner_username: participants[0].to_string(),
        participant_usernames: participants.iter().map(ToString::to_string).collect(),
        created_at: Timestamp(Utc::now()),
    };
    let id = room.id;
    store.put_room(room);
    id
}

async fn recv(conn: &mut ClientConnection) -> ServerEvent {
    timeout(Duration::from_secs(1), conn.events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

async fn join(engine: &ChatEngine, conn: &mut ClientConnection, room_id: Uuid) {
    engine.join_room(conn.id, &room_id.to_string()).await.unwrap();
    let event = recv(conn).await;
    assert!(matches!(event, ServerEvent::JoinedRoom { room_id: id } if id == room_id));
}

#[tokio::test]
async fn connect_requires_username() {
    let (_, engine) = quick_engine();

    assert!(matches!(
        engine.connect(None).await,
        Err(EngineError::NotAuthenticated)
    ));
    assert!(matches!(
        engine.connect(Some("   ")).await,
        Err(EngineError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn connect_resolves_user() {
    let (store, engine) = quick_engine();

    let conn = engine.connect(Some("teja")).await.unwrap();

    assert_eq!(conn.username, "teja");
    assert_eq!(store.user_count(), 1);
}

#[tokio::test]
async fn join_reports_validation_errors_to_origin() {
    let (_, engine) = quick_engine();
    let mut conn = engine.connect(Some("teja")).await.unwrap();

    engine
        .handle_client_event(conn.id, ClientEvent::JoinRoom { room_id: "".into() })
        .await;
    assert!(matches!(
        recv(&mut conn).await,
        ServerEvent::Error { message } if message == "room_id is required"
    ));

    engine
        .handle_client_event(
            conn.id,
            ClientEvent::JoinRoom {
                room_id: "not-a-uuid".into(),
            },
        )
        .await;
    assert!(matches!(
        recv(&mut conn).await,
        ServerEvent::Error { message } if message == "Invalid room_id format"
    ));

    engine
        .handle_client_event(
            conn.id,
            ClientEvent::JoinRoom {
                room_id: Uuid::new_v4().to_string(),
            },
        )
        .await;
    assert!(matches!(
        recv(&mut conn).await,
        ServerEvent::Error { message } if message == "Room not found"
    ));
}

#[tokio::test]
async fn join_requires_membership() {
    let (store, engine) = quick_engine();
    let room_id = seed_room(&store, &["mira"]);
    let conn = engine.connect(Some("teja")).await.unwrap();

    let err = engine.join_room(conn.id, &room_id.to_string()).await.unwrap_err();

    assert!(matches!(err, EngineError::Rooms(RoomsError::NotParticipant)));
}

#[tokio::test]
async fn rejoining_delivers_each_message_once() {
    let (store, engine) = quick_engine();
    let room_id = seed_room(&store, &["teja"]);
    let mut conn = engine.connect(Some("teja")).await.unwrap();

    join(&engine, &mut conn, room_id).await;
    join(&engine, &mut conn, room_id).await;

    engine.send_message(conn.id, &room_id.to_string(), "hello").await.unwrap();

    assert!(matches!(recv(&mut conn).await, ServerEvent::NewMessage(_)));
    assert!(conn.events.try_recv().is_err());
}

#[tokio::test]
async fn message_reaches_all_joined_participants() {
    let (store, engine) = quick_engine();
    let room_id = seed_room(&store, &["teja", "mira"]);
    let mut a = engine.connect(Some("teja")).await.unwrap();
    let mut b = engine.connect(Some("mira")).await.unwrap();
    join(&engine, &mut a, room_id).await;
    join(&engine, &mut b, room_id).await;

    let sent = engine
        .send_message(a.id, &room_id.to_string(), "hello room")
        .await
        .unwrap();

    for conn in [&mut a, &mut b] {
        match recv(conn).await {
            ServerEvent::NewMessage(message) => {
                assert_eq!(message.id, sent.id);
                assert_eq!(message.sender_username, "teja");
                assert_eq!(message.text, "hello room");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(store.message_count(), 1);
}

#[tokio::test]
async fn empty_text_is_rejected_without_persisting() {
    let (store, engine) = quick_engine();
    let room_id = seed_room(&store, &["teja"]);
    let mut conn = engine.connect(Some("teja")).await.unwrap();
    join(&engine, &mut conn, room_id).await;

    engine
        .handle_client_event(
            conn.id,
            ClientEvent::SendMessage {
                room_id: room_id.to_string(),
                text: "   ".into(),
            },
        )
        .await;

    assert!(matches!(
        recv(&mut conn).await,
        ServerEvent::Error { message } if message == "text cannot be empty"
    ));
    assert_eq!(store.message_count(), 0);
}

#[tokio::test]
async fn non_participant_cannot_send() {
    let (store, engine) = quick_engine();
    let room_id = seed_room(&store, &["mira"]);
    let mut outsider = engine.connect(Some("teja")).await.unwrap();

    engine
        .handle_client_event(
            outsider.id,
            ClientEvent::SendMessage {
                room_id: room_id.to_string(),
                text: "let me in".into(),
            },
        )
        .await;

    assert!(matches!(
        recv(&mut outsider).await,
        ServerEvent::Error { message } if message == "Not a participant of this room"
    ));
    assert_eq!(store.message_count(), 0);
}

#[tokio::test]
async fn membership_revocation_blocks_later_sends() {
    let (store, engine) = quick_engine();
    let room_id = seed_room(&store, &["teja", "mira"]);
    let mut b = engine.connect(Some("mira")).await.unwrap();
    join(&engine, &mut b, room_id).await;

    store
        .update_room(room_id, None, Some(&["teja".to_string()]))
        .await
        .unwrap();

    let err = engine
        .send_message(b.id, &room_id.to_string(), "still here?")
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Rooms(RoomsError::NotParticipant)));
    assert_eq!(store.message_count(), 0);
}

#[tokio::test]
async fn revoked_member_still_receives_until_leaving() {
    // Revocation does not retroactively tear down an existing subscription;
    // the stale window closes at the next join or send attempt.
    let (store, engine) = quick_engine();
    let room_id = seed_room(&store, &["teja", "mira"]);
    let mut a = engine.connect(Some("teja")).await.unwrap();
    let mut b = engine.connect(Some("mira")).await.unwrap();
    join(&engine, &mut a, room_id).await;
    join(&engine, &mut b, room_id).await;

    store
        .update_room(room_id, None, Some(&["teja".to_string()]))
        .await
        .unwrap();

    engine.send_message(a.id, &room_id.to_string(), "hello").await.unwrap();

    assert!(matches!(recv(&mut b).await, ServerEvent::NewMessage(_)));
}

#[tokio::test]
async fn disconnect_purges_subscriptions() {
    let (store, engine) = quick_engine();
    let room_id = seed_room(&store, &["teja", "mira"]);
    let mut a = engine.connect(Some("teja")).await.unwrap();
    let mut b = engine.connect(Some("mira")).await.unwrap();
    join(&engine, &mut a, room_id).await;
    join(&engine, &mut b, room_id).await;

    engine.disconnect(b.id).await;

    engine.send_message(a.id, &room_id.to_string(), "anyone?").await.unwrap();

    assert!(matches!(recv(&mut a).await, ServerEvent::NewMessage(_)));
    assert!(b.events.try_recv().is_err());
}

#[tokio::test]
async fn leave_stops_delivery() {
    let (store, engine) = quick_engine();
    let room_id = seed_room(&store, &["teja", "mira"]);
    let mut a = engine.connect(Some("teja")).await.unwrap();
    let mut b = engine.connect(Some("mira")).await.unwrap();
    join(&engine, &mut a, room_id).await;
    join(&engine, &mut b, room_id).await;

    engine.leave_room(b.id, &room_id.to_string()).await.unwrap();
    assert!(matches!(
        recv(&mut b).await,
        ServerEvent::LeftRoom { room_id: id } if id == room_id
    ));

    engine.send_message(a.id, &room_id.to_string(), "bye").await.unwrap();

    assert!(matches!(recv(&mut a).await, ServerEvent::NewMessage(_)));
    assert!(b.events.try_recv().is_err());
}

#[tokio::test]
async fn store_failure_fails_the_send() {
    let (store, engine) = quick_engine();
    let room_id = seed_room(&store, &["teja"]);
    let mut conn = engine.connect(Some("teja")).await.unwrap();
    join(&engine, &mut conn, room_id).await;

    store.fail_message_inserts(true);
    engine
        .handle_client_event(
            conn.id,
            ClientEvent::SendMessage {
                room_id: room_id.to_string(),
                text: "hello".into(),
            },
        )
        .await;

    assert!(matches!(
        recv(&mut conn).await,
        ServerEvent::Error { message } if message == "Internal server error"
    ));
    assert_eq!(store.message_count(), 0);
}

#[tokio::test]
async fn mention_triggers_assistant_reply() {
    let (store, engine) = engine_with(Arc::new(StubBackend {
        reply: "Rust is a language.".into(),
        delay: Duration::from_millis(20),
    }));
    let room_id = seed_room(&store, &["teja"]);
    let mut conn = engine.connect(Some("teja")).await.unwrap();
    join(&engine, &mut conn, room_id).await;

    engine
        .send_message(conn.id, &room_id.to_string(), "@AI what is rust?")
        .await
        .unwrap();

    let first = match recv(&mut conn).await {
        ServerEvent::NewMessage(message) => message,
        other => panic!("unexpected event: {other:?}"),
    };
    assert_eq!(first.sender_username, "teja");

    let reply = match recv(&mut conn).await {
        ServerEvent::NewMessage(message) => message,
        other => panic!("unexpected event: {other:?}"),
    };
    assert_eq!(reply.sender_username, "AI");
    assert_eq!(reply.text, "Rust is a language.");
    assert!(reply.created_at > first.created_at);
    assert_eq!(store.message_count(), 2);
}

#[tokio::test]
async fn assistant_failure_posts_fallback() {
    let (store, engine) = engine_with(Arc::new(FailingBackend));
    let room_id = seed_room(&store, &["teja"]);
    let mut conn = engine.connect(Some("teja")).await.unwrap();
    join(&engine, &mut conn, room_id).await;

    engine
        .send_message(conn.id, &room_id.to_string(), "@AI help")
        .await
        .unwrap();

    recv(&mut conn).await; // the user's own message
    let reply = match recv(&mut conn).await {
        ServerEvent::NewMessage(message) => message,
        other => panic!("unexpected event: {other:?}"),
    };
    assert_eq!(reply.text, "Sorry, I couldn't process that request.");
    assert_eq!(reply.sender_username, "AI");
}

#[tokio::test]
async fn assistant_reply_never_triggers_another_reply() {
    let (store, engine) = engine_with(Arc::new(StubBackend {
        reply: "try asking @AI again".into(),
        delay: Duration::ZERO,
    }));
    let room_id = seed_room(&store, &["teja"]);
    let mut conn = engine.connect(Some("teja")).await.unwrap();
    join(&engine, &mut conn, room_id).await;

    engine
        .send_message(conn.id, &room_id.to_string(), "@AI hello")
        .await
        .unwrap();

    recv(&mut conn).await;
    recv(&mut conn).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(store.message_count(), 2);
    assert!(conn.events.try_recv().is_err());
}

#[tokio::test]
async fn plain_messages_do_not_reach_the_assistant() {
    let (store, engine) = engine_with(Arc::new(StubBackend {
        reply: "should not appear".into(),
        delay: Duration::ZERO,
    }));
    let room_id = seed_room(&store, &["teja"]);
    let mut conn = engine.connect(Some("teja")).await.unwrap();
    join(&engine, &mut conn, room_id).await;

    engine
        .send_message(conn.id, &room_id.to_string(), "good morning")
        .await
        .unwrap();

    recv(&mut conn).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(store.message_count(), 1);
}

#[tokio::test]
async fn assistant_reply_skipped_when_room_deleted() {
    let (store, engine) = engine_with(Arc::new(StubBackend {
        reply: "too late".into(),
        delay: Duration::from_millis(30),
    }));
    let room_id = seed_room(&store, &["teja"]);
    let mut conn = engine.connect(Some("teja")).await.unwrap();
    join(&engine, &mut conn, room_id).await;

    engine
        .send_message(conn.id, &room_id.to_string(), "@AI hello")
        .await
        .unwrap();
    recv(&mut conn).await;

    store.delete_room(room_id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(store.message_count(), 0);
}
