use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed message between two participants.
///
/// `created_at` is milliseconds since the Unix epoch, assigned by the store
/// and never lower than any previously stored value. `seq` is the store's
/// insertion sequence and breaks ties between equal `created_at` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: i64,
    pub seq: i64,
    pub read: bool,
}

impl Message {
    /// Ordering key used by transcripts and inbox recency.
    pub fn order_key(&self) -> (i64, i64) {
        (self.created_at, self.seq)
    }

    /// The other participant, as seen from `user_id`.
    /// Returns `None` when `user_id` is not part of this message.
    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        if self.sender_id == user_id {
            Some(&self.receiver_id)
        } else if self.receiver_id == user_id {
            Some(&self.sender_id)
        } else {
            None
        }
    }
}

/// One row of a user's inbox: the latest activity with a single partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub partner_id: String,
    pub last_message_content: String,
    pub last_message_time: i64,
    pub unread_count: usize,
}

/// Role attribute supplied by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    Patient,
}
