//! Data model types shared between the server and its clients.

pub mod events;
pub mod message;
pub mod room;
pub mod timestamp;
pub mod user;

pub use events::{ClientEvent, ServerEvent};
pub use message::{ASSISTANT_USERNAME, Message};
pub use room::{CreateRoomRequest, Room, UpdateRoomRequest};
pub use timestamp::Timestamp;
pub use user::User;
