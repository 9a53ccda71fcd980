//! Service layer between the HTTP/realtime edges and the store gateway.

pub mod assistant;
pub mod identity;
pub mod messages;
pub mod rooms;
