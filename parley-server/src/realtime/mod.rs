//! Realtime chat: connection sessions, room fan-out, and the event engine.

pub mod engine;
pub mod hub;
pub mod sessions;

#[cfg(test)]
mod engine_tests;

use std::fmt;

use uuid::Uuid;

/// Opaque identifier for one live client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocates a fresh connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
