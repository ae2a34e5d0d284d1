use std::sync::Arc;

use application::{RoomRegistry, SessionDependencies};
use config::ChatConfig;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub session_deps: Arc<SessionDependencies>,
    pub chat: ChatConfig,
}

impl AppState {
    pub fn new(
        registry: Arc<RoomRegistry>,
        session_deps: Arc<SessionDependencies>,
        chat: ChatConfig,
    ) -> Self {
        Self {
            registry,
            session_deps,
            chat,
        }
    }
}
