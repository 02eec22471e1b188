use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::config::Config;
use crate::storage::ChatStore;
use crate::websocket::{Broadcaster, RoomRegistry};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub registry: RoomRegistry,
    pub broadcaster: Broadcaster,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn ChatStore>, auth: Arc<dyn AuthProvider>, config: Arc<Config>) -> Self {
        let registry = RoomRegistry::new();
        let broadcaster = Broadcaster::new(registry.clone());
        Self {
            store,
            registry,
            broadcaster,
            auth,
            config,
        }
    }
}
