use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (messages)");
        conn.execute_batch(
            "
            CREATE TABLE messages (
                seq          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT NOT NULL UNIQUE,
                sender_id    TEXT NOT NULL,
                receiver_id  TEXT NOT NULL,
                content      TEXT NOT NULL,
                created_at   INTEGER NOT NULL,
                read         INTEGER NOT NULL DEFAULT 0,
                CHECK (sender_id <> receiver_id)
            );

            CREATE INDEX idx_messages_pair
                ON messages(sender_id, receiver_id, seq);

            CREATE INDEX idx_messages_receiver
                ON messages(receiver_id, seq);

            CREATE INDEX idx_messages_unread
                ON messages(receiver_id, read);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
