use std::sync::Arc;
use std::time::Duration;

use carelink_gateway::connection::HEARTBEAT_INTERVAL;
use carelink_gateway::dispatcher::Dispatcher;
use carelink_index::{ConversationIndex, MessageStore};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub index: ConversationIndex<Arc<dyn MessageStore>>,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    pub heartbeat_interval: Duration,
}

impl AppStateInner {
    pub fn new(store: Arc<dyn MessageStore>, dispatcher: Dispatcher, jwt_secret: String) -> AppState {
        Self::with_heartbeat(store, dispatcher, jwt_secret, HEARTBEAT_INTERVAL)
    }

    pub fn with_heartbeat(
        store: Arc<dyn MessageStore>,
        dispatcher: Dispatcher,
        jwt_secret: String,
        heartbeat_interval: Duration,
    ) -> AppState {
        Arc::new(Self {
            index: ConversationIndex::new(store),
            dispatcher,
            jwt_secret,
            heartbeat_interval,
        })
    }
}
