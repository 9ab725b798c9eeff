use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use bolo_types::events::ServerEvent;
use bolo_types::models::{NewMessage, UserId};

use crate::generator::ReplyGenerator;
use crate::pipeline::Pipeline;

/// Reply sent when generation fails or comes back empty.
pub const FALLBACK_REPLY: &str = "Oof, my brain connection timed out. Try again later? 😵‍💫";

/// Pause between generating a reply and delivering it, so the typing
/// indicator is visible.
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(1000);

/// The reserved bot account, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: UserId,
    pub username: String,
}

/// Answers messages addressed to the bot. Every bot-directed message gets
/// its own task: generate, wait, typing-off, deliver.
#[derive(Clone)]
pub struct BotResponder {
    inner: Arc<BotInner>,
}

struct BotInner {
    identity: BotIdentity,
    generator: Arc<dyn ReplyGenerator>,
    reply_delay: Duration,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl BotResponder {
    pub fn new(
        identity: BotIdentity,
        generator: Arc<dyn ReplyGenerator>,
        reply_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(BotInner {
                identity,
                generator,
                reply_delay,
                tasks: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.inner.identity
    }

    pub fn is_bot(&self, user_id: &str) -> bool {
        self.inner.identity.id == user_id
    }

    /// Replies still generating or waiting to be delivered.
    pub fn pending(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Start answering `prompt` from `requester`. Returns immediately.
    pub(crate) fn spawn_reply(&self, pipeline: Pipeline, requester: UserId, prompt: String) {
        let bot = self.clone();
        self.inner
            .tasks
            .spawn(async move { bot.reply(pipeline, requester, prompt).await });
    }

    /// Wait until every reply started so far has been delivered.
    pub async fn wait_idle(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    /// Stop pending replies at their next wait point and wait for the rest.
    /// Replies already being delivered finish.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
    }

    async fn reply(self, pipeline: Pipeline, requester: UserId, prompt: String) {
        debug!("bot generating reply for {}", requester);
        let text = tokio::select! {
            _ = self.inner.shutdown.cancelled() => None,
            text = async {
                let text = self.generate(&prompt).await;
                tokio::time::sleep(self.inner.reply_delay).await;
                text
            } => Some(text),
        };

        // Typing-off goes out on every path, cancelled or not
        pipeline.rooms().broadcast(
            &requester,
            &ServerEvent::Typing {
                from: self.inner.identity.id.clone(),
                typing: false,
            },
        );

        let Some(text) = text else {
            debug!("bot reply to {} cancelled by shutdown", requester);
            return;
        };

        debug!("bot replying to {}", requester);
        let reply = NewMessage::text(self.inner.identity.id.clone(), requester.clone(), text);
        if let Err(e) = pipeline.deliver(reply).await {
            error!("bot reply to {} was not delivered: {}", requester, e);
        }
    }

    async fn generate(&self, prompt: &str) -> String {
        match self.inner.generator.generate(prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("reply generator returned an empty reply, using fallback");
                FALLBACK_REPLY.to_string()
            }
            Err(e) => {
                warn!("reply generation failed, using fallback: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
