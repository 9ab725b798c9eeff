use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use bolo_db::Database;
use bolo_db::models::MessageRow;
use bolo_types::models::{Message, MessageKind, NewMessage};

/// Durable message log. Implementations must not lose concurrent appends and
/// must make each `mark_read` atomic.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist `msg`, assigning id and creation time.
    async fn append(&self, msg: NewMessage) -> anyhow::Result<Message>;

    /// Conversation between `a` and `b` in both directions, oldest first.
    async fn range(&self, a: &str, b: &str) -> anyhow::Result<Vec<Message>>;

    /// Mark unread `from -> to` messages read. Returns how many changed.
    async fn mark_read(&self, from: &str, to: &str) -> anyhow::Result<usize>;
}

/// `MessageStore` over the shared SQLite database. Every call runs on the
/// blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(&self, msg: NewMessage) -> anyhow::Result<Message> {
        let db = self.db.clone();
        let id = Uuid::new_v4();
        let (row, msg) = tokio::task::spawn_blocking(move || {
            let row = db.insert_message(&id.to_string(), &msg)?;
            Ok::<_, anyhow::Error>((row, msg))
        })
        .await
        .context("spawn_blocking join error")??;

        Ok(Message {
            id,
            from: msg.from,
            to: msg.to,
            text: msg.text,
            image: msg.image,
            audio: msg.audio,
            kind: msg.kind,
            read: false,
            created_at: parse_timestamp(&row),
        })
    }

    async fn range(&self, a: &str, b: &str) -> anyhow::Result<Vec<Message>> {
        let db = self.db.clone();
        let (a, b) = (a.to_string(), b.to_string());
        let rows = tokio::task::spawn_blocking(move || db.messages_between(&a, &b))
            .await
            .context("spawn_blocking join error")??;

        Ok(rows.into_iter().map(row_to_message).collect())
    }

    async fn mark_read(&self, from: &str, to: &str) -> anyhow::Result<usize> {
        let db = self.db.clone();
        let (from, to) = (from.to_string(), to.to_string());
        let n = tokio::task::spawn_blocking(move || db.mark_read(&from, &to))
            .await
            .context("spawn_blocking join error")??;
        Ok(n)
    }
}

fn row_to_message(row: MessageRow) -> Message {
    let created_at = parse_timestamp(&row);
    Message {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", row.id, e);
            Uuid::default()
        }),
        kind: row.kind.parse().unwrap_or_else(|e| {
            warn!("Message '{}': {}", row.id, e);
            MessageKind::Text
        }),
        from: row.from_id,
        to: row.to_id,
        text: row.text,
        image: row.image,
        audio: row.audio,
        read: row.read,
        created_at,
    }
}

fn parse_timestamp(row: &MessageRow) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&row.created_at)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on message '{}': {}", row.created_at, row.id, e);
            DateTime::default()
        })
}
