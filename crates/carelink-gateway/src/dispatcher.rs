use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::trace;
use uuid::Uuid;

use carelink_types::events::GatewayEvent;

/// Routes gateway events to connected users. One live connection per user;
/// a newer connection replaces the older one.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<String, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a per-user channel. Returns (conn_id, receiver).
    pub async fn register_user_channel(
        &self,
        user_id: &str,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id.to_string(), (conn_id, tx));
        (conn_id, rx)
    }

    /// Unregister a per-user channel, but only if conn_id still owns it.
    pub async fn unregister_user_channel(&self, user_id: &str, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some((stored_conn_id, _)) = channels.get(user_id) {
            if *stored_conn_id == conn_id {
                channels.remove(user_id);
            }
        }
    }

    /// Send a targeted event to a specific user. Returns whether it was queued;
    /// offline users simply miss the event.
    pub async fn send_to_user(&self, user_id: &str, event: GatewayEvent) -> bool {
        let channels = self.inner.user_channels.read().await;
        let delivered = channels
            .get(user_id)
            .is_some_and(|(_, tx)| tx.send(event).is_ok());
        trace!("Event for {} delivered={}", user_id, delivered);
        delivered
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.inner.user_channels.read().await.contains_key(user_id)
    }
}
