//! Application state shared across all routes.

use std::sync::Arc;

use shared::config::Config;

use crate::realtime::engine::ChatEngine;
use crate::services::assistant::AssistantService;
use crate::services::identity::IdentityService;
use crate::services::messages::MessagesService;
use crate::services::rooms::RoomsService;
use crate::store::Store;

/// Shared state: the store gateway, the service layer, and the realtime
/// engine, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) identity: IdentityService,
    pub(crate) rooms: RoomsService,
    pub(crate) messages: MessagesService,
    pub(crate) engine: ChatEngine,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish()
    }
}

impl AppState {
    /// Wires the service layer and engine over a store gateway.
    pub fn new(store: Arc<dyn Store>, assistant: AssistantService, config: &Config) -> Self {
        let identity = IdentityService::new(store.clone());
        let rooms = RoomsService::new(store.clone(), identity.clone());
        let messages = MessagesService::new(store.clone(), rooms.clone());
        let engine = ChatEngine::new(
            store.clone(),
            identity.clone(),
            rooms.clone(),
            assistant,
            config.realtime.queue_capacity,
        );

        Self {
            store,
            identity,
            rooms,
            messages,
            engine,
        }
    }
}
