//! Registry of live connections and their authenticated usernames.

use std::collections::HashMap;

use shared::models::ServerEvent;
use tokio::sync::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use super::ConnectionId;

/// State held per live connection.
#[derive(Debug, Clone)]
pub struct Session {
    /// Username asserted at connect time.
    pub username: String,
    /// Outbound event queue for this connection.
    pub sender: mpsc::Sender<ServerEvent>,
}

/// Connection-scoped session registry.
///
/// One entry per live connection; the entry exists from successful connect
/// until disconnect. A username may appear in several entries at once, one
/// per open connection.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ConnectionId, Session>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection, allocating its id.
    pub async fn register(&self, username: String, sender: mpsc::Sender<ServerEvent>) -> ConnectionId {
        let id = ConnectionId::new();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Session { username, sender });
        debug!(connection = %id, "session registered");
        id
    }

    /// Look up the session for a connection.
    pub async fn get(&self, id: ConnectionId) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(&id).cloned()
    }

    /// Remove a connection's session, returning it if present.
    pub async fn unregister(&self, id: ConnectionId) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&id);
        if removed.is_some() {
            debug!(connection = %id, "session unregistered");
        }
        removed
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }
}
