use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use carelink_types::models::Message;

/// A message that has not been appended yet. The store assigns
/// `created_at`, `seq` and the initial `read = false`.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
}

/// Storage collaborator for the conversation index.
///
/// Every method must run against a single consistent snapshot: one
/// statement or one lock acquisition. `mark_read` must be a conditional
/// patch (`read = false -> true`) so concurrent callers never lose or
/// double count a transition.
pub trait MessageStore: Send + Sync {
    /// Append one message, returning it with the assigned clock and sequence.
    fn append(&self, new: NewMessage) -> Result<Message>;

    /// Mark every unread `sender -> receiver` message read. Returns how many changed.
    fn mark_read(&self, sender_id: &str, receiver_id: &str) -> Result<usize>;

    /// All messages between `a` and `b` in either direction, by insertion order.
    fn between(&self, a: &str, b: &str) -> Result<Vec<Message>>;

    /// All messages sent or received by `user_id`, by insertion order.
    fn involving(&self, user_id: &str) -> Result<Vec<Message>>;

    /// Number of unread messages received by `receiver_id`.
    fn count_unread(&self, receiver_id: &str) -> Result<usize>;
}

impl<S: MessageStore + ?Sized> MessageStore for Arc<S> {
    fn append(&self, new: NewMessage) -> Result<Message> {
        (**self).append(new)
    }

    fn mark_read(&self, sender_id: &str, receiver_id: &str) -> Result<usize> {
        (**self).mark_read(sender_id, receiver_id)
    }

    fn between(&self, a: &str, b: &str) -> Result<Vec<Message>> {
        (**self).between(a, b)
    }

    fn involving(&self, user_id: &str) -> Result<Vec<Message>> {
        (**self).involving(user_id)
    }

    fn count_unread(&self, receiver_id: &str) -> Result<usize> {
        (**self).count_unread(receiver_id)
    }
}

/// Next value of the store clock: wall time in milliseconds, never below `last`.
pub fn next_created_at(last: i64) -> i64 {
    chrono::Utc::now().timestamp_millis().max(last)
}
