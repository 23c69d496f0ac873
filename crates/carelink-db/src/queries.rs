use anyhow::Result;
use rusqlite::{Connection, Params};

use carelink_index::{MessageStore, NewMessage};
use carelink_types::models::Message;

use crate::Database;
use crate::models::MessageRow;

impl MessageStore for Database {
    fn append(&self, new: NewMessage) -> Result<Message> {
        let now = chrono::Utc::now().timestamp_millis();

        self.with_conn_mut(|conn| {
            // Clock is clamped inside the statement so it can't go backwards
            let (seq, created_at): (i64, i64) = conn.query_row(
                "INSERT INTO messages (id, sender_id, receiver_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4,
                         MAX(?5, COALESCE((SELECT MAX(created_at) FROM messages), 0)))
                 RETURNING seq, created_at",
                rusqlite::params![
                    new.id.to_string(),
                    new.sender_id,
                    new.receiver_id,
                    new.content,
                    now
                ],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            Ok(Message {
                id: new.id,
                sender_id: new.sender_id,
                receiver_id: new.receiver_id,
                content: new.content,
                created_at,
                seq,
                read: false,
            })
        })
    }

    fn mark_read(&self, sender_id: &str, receiver_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET read = 1
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND read = 0",
                (sender_id, receiver_id),
            )?;
            Ok(updated)
        })
    }

    fn between(&self, a: &str, b: &str) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "(sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)",
                (a, b),
            )
        })
    }

    fn involving(&self, user_id: &str) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            query_messages(conn, "sender_id = ?1 OR receiver_id = ?1", [user_id])
        })
    }

    fn count_unread(&self, receiver_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND read = 0",
                [receiver_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

fn query_messages<P: Params>(conn: &Connection, filter: &str, params: P) -> Result<Vec<Message>> {
    let sql = format!(
        "SELECT {} FROM messages WHERE {} ORDER BY seq",
        MessageRow::COLUMNS,
        filter
    );
    let mut stmt = conn.prepare_cached(&sql)?;

    let rows = stmt
        .query_map(params, MessageRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(MessageRow::into_message).collect()
}
