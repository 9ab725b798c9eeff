use crate::models::{MessageRow, NewUser, UserRow};
use crate::Database;
use anyhow::{Result, anyhow};
use bolo_types::models::NewMessage;
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, username, email, password, avatar_image, about, created_at";
const MESSAGE_COLUMNS: &str =
    "seq, id, from_id, to_id, kind, text, image, audio, is_read, created_at";

impl Database {
    // -- Users --

    /// Insert `user`. Returns false, without touching the table, when the
    /// username or email is already taken.
    pub fn create_user(&self, user: &NewUser) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (id, username, email, password, avatar_image, about)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.email,
                    user.password,
                    user.avatar_image,
                    user.about
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    /// Look up `user.username`, inserting `user` if nobody has it yet.
    /// Returns the stored row and whether this call created it.
    pub fn ensure_user(&self, user: &NewUser) -> Result<(UserRow, bool)> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (id, username, email, password, avatar_image, about)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.email,
                    user.password,
                    user.avatar_image,
                    user.about
                ],
            )?;

            let row = query_user_by(conn, "username", &user.username)?.ok_or_else(|| {
                anyhow!(
                    "could not create user '{}': email '{}' already taken",
                    user.username,
                    user.email
                )
            })?;

            Ok((row, inserted == 1))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by(conn, "id", id))
    }

    /// Everyone except `id`, oldest account first.
    pub fn list_users_except(&self, id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id != ?1 ORDER BY created_at, username"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false if no user has this id.
    pub fn set_avatar(&self, id: &str, image: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET avatar_image = ?1 WHERE id = ?2",
                rusqlite::params![image, id],
            )?;
            Ok(n == 1)
        })
    }

    // -- Messages --

    /// Insert a message and return the stored row. `created_at` is assigned
    /// here, under the connection lock, and never goes below the newest row.
    pub fn insert_message(&self, id: &str, msg: &NewMessage) -> Result<MessageRow> {
        self.with_conn(|conn| {
            let newest: Option<String> = conn
                .query_row(
                    "SELECT created_at FROM messages ORDER BY seq DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;

            let mut created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
            if let Some(newest) = newest {
                if newest > created_at {
                    created_at = newest;
                }
            }

            conn.execute(
                "INSERT INTO messages (id, from_id, to_id, kind, text, image, audio, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
                rusqlite::params![
                    id,
                    msg.from,
                    msg.to,
                    msg.kind.as_str(),
                    msg.text,
                    msg.image,
                    msg.audio,
                    created_at
                ],
            )?;

            Ok(MessageRow {
                seq: conn.last_insert_rowid(),
                id: id.to_string(),
                from_id: msg.from.clone(),
                to_id: msg.to.clone(),
                kind: msg.kind.as_str().to_string(),
                text: msg.text.clone(),
                image: msg.image.clone(),
                audio: msg.audio.clone(),
                read: false,
                created_at,
            })
        })
    }

    /// Both directions of the conversation between `a` and `b`, oldest first.
    pub fn messages_between(&self, a: &str, b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE (from_id = ?1 AND to_id = ?2) OR (from_id = ?2 AND to_id = ?1)
                 ORDER BY created_at ASC, seq ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([a, b], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip every unread `from -> to` message to read. Returns how many changed.
    pub fn mark_read(&self, from: &str, to: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET is_read = 1 WHERE from_id = ?1 AND to_id = ?2 AND is_read = 0",
                [from, to],
            )?;
            Ok(n)
        })
    }
}

fn query_user_by(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always one of our literals, never user input.
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let row = conn.query_row(&sql, [value], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        avatar_image: row.get(4)?,
        about: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        seq: row.get(0)?,
        id: row.get(1)?,
        from_id: row.get(2)?,
        to_id: row.get(3)?,
        kind: row.get(4)?,
        text: row.get(5)?,
        image: row.get(6)?,
        audio: row.get(7)?,
        read: row.get(8)?,
        created_at: row.get(9)?,
    })
}
