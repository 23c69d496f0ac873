use anyhow::{Context, Result};
use rusqlite::Row;
use uuid::Uuid;

use carelink_types::models::Message;

/// Database row for the `messages` table. Ids stay as TEXT here and are
/// parsed when converted into the shared `Message` type.
pub struct MessageRow {
    pub seq: i64,
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: i64,
    pub read: bool,
}

impl MessageRow {
    pub const COLUMNS: &'static str = "seq, id, sender_id, receiver_id, content, created_at, read";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            id: row.get(1)?,
            sender_id: row.get(2)?,
            receiver_id: row.get(3)?,
            content: row.get(4)?,
            created_at: row.get(5)?,
            read: row.get(6)?,
        })
    }

    pub fn into_message(self) -> Result<Message> {
        let id: Uuid = self
            .id
            .parse()
            .with_context(|| format!("Corrupt message id '{}' at seq {}", self.id, self.seq))?;

        Ok(Message {
            id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            content: self.content,
            created_at: self.created_at,
            seq: self.seq,
            read: self.read,
        })
    }
}
