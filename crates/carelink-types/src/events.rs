use serde::{Deserialize, Serialize};

use crate::models::{Message, Role};

/// Events pushed to a user over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is authenticated
    Ready { user_id: String },

    /// A new message addressed to this user
    MessageCreate { message: Message, sender_role: Role },

    /// The partner marked messages this user sent as read
    MessagesRead { reader_id: String, count: usize },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the connection; must be the first frame after the upgrade
    Identify { token: String },
}
