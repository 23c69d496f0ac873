use std::sync::RwLock;

use anyhow::{Result, anyhow};

use carelink_types::models::Message;

use crate::store::{MessageStore, NewMessage, next_created_at};

/// In-process message log guarded by a single lock.
#[derive(Default)]
pub struct MemoryStore {
    log: RwLock<Log>,
}

#[derive(Default)]
struct Log {
    messages: Vec<Message>,
    last_created_at: i64,
    last_seq: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        let log = self
            .log
            .read()
            .map_err(|e| anyhow!("Message log lock poisoned: {}", e))?;
        Ok(log.messages.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read_matching<F>(&self, keep: F) -> Result<Vec<Message>>
    where
        F: Fn(&Message) -> bool,
    {
        let log = self
            .log
            .read()
            .map_err(|e| anyhow!("Message log lock poisoned: {}", e))?;
        Ok(log.messages.iter().filter(|m| keep(m)).cloned().collect())
    }
}

impl MessageStore for MemoryStore {
    fn append(&self, new: NewMessage) -> Result<Message> {
        let mut log = self
            .log
            .write()
            .map_err(|e| anyhow!("Message log lock poisoned: {}", e))?;

        log.last_created_at = next_created_at(log.last_created_at);
        log.last_seq += 1;

        let message = Message {
            id: new.id,
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            content: new.content,
            created_at: log.last_created_at,
            seq: log.last_seq,
            read: false,
        };
        log.messages.push(message.clone());
        Ok(message)
    }

    fn mark_read(&self, sender_id: &str, receiver_id: &str) -> Result<usize> {
        let mut log = self
            .log
            .write()
            .map_err(|e| anyhow!("Message log lock poisoned: {}", e))?;

        let mut updated = 0;
        for m in log
            .messages
            .iter_mut()
            .filter(|m| !m.read && m.sender_id == sender_id && m.receiver_id == receiver_id)
        {
            m.read = true;
            updated += 1;
        }
        Ok(updated)
    }

    fn between(&self, a: &str, b: &str) -> Result<Vec<Message>> {
        self.read_matching(|m| {
            (m.sender_id == a && m.receiver_id == b) || (m.sender_id == b && m.receiver_id == a)
        })
    }

    fn involving(&self, user_id: &str) -> Result<Vec<Message>> {
        self.read_matching(|m| m.sender_id == user_id || m.receiver_id == user_id)
    }

    fn count_unread(&self, receiver_id: &str) -> Result<usize> {
        let log = self
            .log
            .read()
            .map_err(|e| anyhow!("Message log lock poisoned: {}", e))?;
        Ok(log
            .messages
            .iter()
            .filter(|m| !m.read && m.receiver_id == receiver_id)
            .count())
    }
}
