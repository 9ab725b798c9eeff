//! Shared fixtures for the gateway unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use bolo_db::Database;
use bolo_types::events::ServerEvent;
use bolo_types::models::{Message, NewMessage};

use crate::bot::{BotIdentity, BotResponder, DEFAULT_REPLY_DELAY};
use crate::generator::{GenerationError, ReplyGenerator};
use crate::pipeline::Pipeline;
use crate::rooms::Rooms;
use crate::store::{MessageStore, SqliteStore};

pub const BOT_ID: &str = "bot-0000";

pub struct Fixture {
    pub pipeline: Pipeline,
    pub rooms: Rooms,
}

/// Always answers with the same text.
pub struct ScriptedGenerator(pub String);

#[async_trait]
impl ReplyGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Ok(self.0.clone())
    }
}

pub struct FailingGenerator;

#[async_trait]
impl ReplyGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Empty)
    }
}

/// Store whose every call fails, as if the database were unreachable.
pub struct FailingStore;

#[async_trait]
impl MessageStore for FailingStore {
    async fn append(&self, _msg: NewMessage) -> anyhow::Result<Message> {
        anyhow::bail!("disk I/O error")
    }

    async fn range(&self, _a: &str, _b: &str) -> anyhow::Result<Vec<Message>> {
        anyhow::bail!("disk I/O error")
    }

    async fn mark_read(&self, _from: &str, _to: &str) -> anyhow::Result<usize> {
        anyhow::bail!("disk I/O error")
    }
}

pub fn fixture() -> Fixture {
    fixture_with_generator(Arc::new(ScriptedGenerator("hi from bot".into())))
}

pub fn fixture_with_generator(generator: Arc<dyn ReplyGenerator>) -> Fixture {
    let db = Arc::new(Database::open_in_memory().expect("in-memory database"));
    build(Arc::new(SqliteStore::new(db)), generator)
}

pub fn fixture_with_store(store: Arc<dyn MessageStore>) -> Fixture {
    build(store, Arc::new(ScriptedGenerator("hi from bot".into())))
}

fn build(store: Arc<dyn MessageStore>, generator: Arc<dyn ReplyGenerator>) -> Fixture {
    let rooms = Rooms::new();
    let bot = BotResponder::new(
        BotIdentity {
            id: BOT_ID.into(),
            username: "BoloAI".into(),
        },
        generator,
        DEFAULT_REPLY_DELAY,
    );
    Fixture {
        pipeline: Pipeline::new(store, rooms.clone(), bot),
        rooms,
    }
}

/// Everything queued for a connection right now.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
