use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            username      TEXT NOT NULL UNIQUE,
            email         TEXT NOT NULL UNIQUE,
            password      TEXT NOT NULL,
            avatar_image  TEXT NOT NULL DEFAULT '',
            about         TEXT NOT NULL DEFAULT '',
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- seq is the insertion order and breaks created_at ties.
        -- User ids are not foreign keys: accounts live outside the message core.
        CREATE TABLE IF NOT EXISTS messages (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT NOT NULL UNIQUE,
            from_id     TEXT NOT NULL,
            to_id       TEXT NOT NULL,
            kind        TEXT NOT NULL DEFAULT 'text',
            text        TEXT NOT NULL DEFAULT '',
            image       TEXT NOT NULL DEFAULT '',
            audio       TEXT NOT NULL DEFAULT '',
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(from_id, to_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_unread
            ON messages(to_id, is_read);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
