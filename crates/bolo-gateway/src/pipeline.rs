use std::sync::Arc;

use tracing::{debug, info, warn};

use bolo_types::events::{SendMessagePayload, ServerEvent};
use bolo_types::models::{Message, MessageKind, NewMessage};

use crate::bot::BotResponder;
use crate::error::GatewayError;
use crate::rooms::Rooms;
use crate::store::MessageStore;

/// Validates, persists and fans out messages, typing indicators and read
/// receipts. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    store: Arc<dyn MessageStore>,
    rooms: Rooms,
    bot: BotResponder,
}

impl Pipeline {
    pub fn new(store: Arc<dyn MessageStore>, rooms: Rooms, bot: BotResponder) -> Self {
        Self {
            inner: Arc::new(PipelineInner { store, rooms, bot }),
        }
    }

    pub fn rooms(&self) -> &Rooms {
        &self.inner.rooms
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.inner.store
    }

    pub fn bot(&self) -> &BotResponder {
        &self.inner.bot
    }

    /// Validate and deliver a message from `sender`. On success both
    /// participants' rooms get `new_message`; a message to the bot also
    /// starts a reply in the background.
    ///
    /// Errors are meant for the sending connection only; nothing has been
    /// broadcast when this returns `Err`.
    pub async fn send(
        &self,
        sender: &str,
        payload: SendMessagePayload,
    ) -> Result<Message, GatewayError> {
        let draft = validate(sender, payload)?;
        let message = self.deliver(draft).await?;

        let bot = self.bot();
        if bot.is_bot(&message.to) && !bot.is_bot(&message.from) {
            self.rooms().broadcast(
                &message.from,
                &ServerEvent::Typing {
                    from: bot.identity().id.clone(),
                    typing: true,
                },
            );
            bot.spawn_reply(self.clone(), message.from.clone(), message.text.clone());
        }

        Ok(message)
    }

    /// Persist an already validated message and broadcast it to both rooms.
    /// Bot replies come back through here.
    pub(crate) async fn deliver(&self, draft: NewMessage) -> Result<Message, GatewayError> {
        let message = self
            .inner
            .store
            .append(draft)
            .await
            .map_err(GatewayError::Persistence)?;

        let event = ServerEvent::NewMessage(message.clone());
        let mut delivered = self.rooms().broadcast(&message.to, &event);
        if message.from != message.to {
            delivered += self.rooms().broadcast(&message.from, &event);
        }

        debug!(
            "message {} {} -> {} ({}) delivered to {} connections",
            message.id, message.from, message.to, message.kind, delivered
        );
        Ok(message)
    }

    /// Relay a typing indicator to `to`. Nothing is stored.
    pub fn relay_typing(&self, from: &str, to: &str, typing: bool) {
        if to.is_empty() {
            return;
        }
        self.rooms().broadcast(
            to,
            &ServerEvent::Typing {
                from: from.to_string(),
                typing,
            },
        );
    }

    /// `reader` has seen everything `other` sent them. Marks those messages
    /// read and tells `other` (the author), not the reader.
    pub async fn mark_read(&self, reader: &str, other: &str) -> Result<usize, GatewayError> {
        if other.is_empty() {
            return Err(GatewayError::Validation("missing peer id".into()));
        }

        let updated = self
            .inner
            .store
            .mark_read(other, reader)
            .await
            .map_err(GatewayError::Persistence)?;

        self.rooms().broadcast(
            other,
            &ServerEvent::MessagesRead {
                from: reader.to_string(),
            },
        );

        if updated > 0 {
            info!("{} read {} messages from {}", reader, updated, other);
        }
        Ok(updated)
    }
}

/// Turn a raw `send_message` payload into a storable message.
pub fn validate(sender: &str, payload: SendMessagePayload) -> Result<NewMessage, GatewayError> {
    let to = payload.to.trim();
    if sender.is_empty() || to.is_empty() {
        return Err(GatewayError::Validation("missing recipient".into()));
    }

    let text = payload.text.as_deref().unwrap_or_default().trim().to_string();
    let image = payload.image.unwrap_or_default().trim().to_string();
    let audio = payload.audio.unwrap_or_default().trim().to_string();

    let kind = match payload.kind.as_deref().map(str::trim) {
        // Untyped payloads are text unless only a media field is set
        None | Some("") if text.is_empty() && !image.is_empty() => MessageKind::Image,
        None | Some("") if text.is_empty() && !audio.is_empty() => MessageKind::Audio,
        None | Some("") => MessageKind::Text,
        Some(raw) => raw
            .parse()
            .map_err(|e| GatewayError::Validation(format!("{e}")))?,
    };

    let draft = NewMessage {
        from: sender.to_string(),
        to: to.to_string(),
        text,
        image,
        audio,
        kind,
    };

    if !draft.payload_matches_kind() {
        warn!("{} sent a malformed {} message to {}", sender, draft.kind, to);
        return Err(GatewayError::Validation(format!(
            "{} message must carry only its own payload",
            draft.kind
        )));
    }

    Ok(draft)
}
