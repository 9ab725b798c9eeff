use serde::{Deserialize, Serialize};

use crate::models::{Message, UserId};

/// Events sent over the WebSocket gateway, server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Connection authenticated and registered in its room
    Ready { user_id: UserId },

    /// A message was stored; sent to both participants
    NewMessage(Message),

    /// A peer started or stopped typing
    Typing { from: UserId, typing: bool },

    /// `from` has read the messages this client sent them
    MessagesRead { from: UserId },

    /// Something the originating connection asked for failed
    Error { msg: String },
}

impl ServerEvent {
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error { msg: msg.into() }
    }

    /// Wire name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::NewMessage(_) => "new_message",
            Self::Typing { .. } => "typing",
            Self::MessagesRead { .. } => "messages_read",
            Self::Error { .. } => "error",
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Join an extra room (older clients join their own id explicitly)
    JoinRoom(UserId),

    /// Relay a typing indicator to `to`
    Typing {
        #[serde(default)]
        to: UserId,
        typing: bool,
    },

    /// Store and deliver a message
    SendMessage(SendMessagePayload),

    /// Mark every unread message from `from` to this user as read
    MarkRead { from: UserId },
}

/// Body of `send_message`. Every field is optional on the wire so that an
/// incomplete payload reaches validation instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendMessagePayload {
    #[serde(default)]
    pub to: UserId,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
}

impl SendMessagePayload {
    pub fn text(to: impl Into<UserId>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_message_with_defaults() {
        let raw = r#"{"type":"send_message","data":{"to":"u2","text":"hi"}}"#;
        let cmd: ClientCommand = serde_json::from_str(raw).unwrap();
        assert_eq!(cmd, ClientCommand::SendMessage(SendMessagePayload::text("u2", "hi")));
    }

    #[test]
    fn parses_send_message_without_recipient() {
        let raw = r#"{"type":"send_message","data":{"type":"image"}}"#;
        let cmd: ClientCommand = serde_json::from_str(raw).unwrap();
        let ClientCommand::SendMessage(payload) = cmd else {
            panic!("expected send_message");
        };
        assert!(payload.to.is_empty());
        assert_eq!(payload.kind.as_deref(), Some("image"));
    }

    #[test]
    fn parses_join_room_with_bare_id() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"join_room","data":"u7"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::JoinRoom("u7".into()));
    }

    #[test]
    fn typing_event_wire_shape() {
        let event = ServerEvent::Typing {
            from: "bot".into(),
            typing: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "typing");
        assert_eq!(json["data"]["from"], "bot");
        assert_eq!(json["data"]["typing"], true);
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"voice_join","data":{}}"#).is_err());
    }
}
