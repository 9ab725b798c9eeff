use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User ids are opaque strings on the wire (UUIDs issued at registration).
pub type UserId = String;

/// Which payload a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Audio,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown message kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for MessageKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// A stored direct message, exactly as it is sent to clients in `new_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from: UserId,
    pub to: UserId,
    pub text: String,
    pub image: String,
    pub audio: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A validated message that has not been persisted yet.
/// The store assigns `id`, `created_at` and `read = false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub from: UserId,
    pub to: UserId,
    pub text: String,
    pub image: String,
    pub audio: String,
    pub kind: MessageKind,
}

impl NewMessage {
    /// Plain text message, used for bot replies.
    pub fn text(from: impl Into<UserId>, to: impl Into<UserId>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            text: text.into(),
            image: String::new(),
            audio: String::new(),
            kind: MessageKind::Text,
        }
    }

    /// Exactly one payload field is set, and it is the one `kind` names.
    pub fn payload_matches_kind(&self) -> bool {
        let filled = [
            !self.text.is_empty(),
            !self.image.is_empty(),
            !self.audio.is_empty(),
        ];
        let expected = match self.kind {
            MessageKind::Text => [true, false, false],
            MessageKind::Image => [false, true, false],
            MessageKind::Audio => [false, false, true],
        };
        filled == expected
    }
}

/// Public view of a user record (never includes the password hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub avatar_image: String,
    pub about: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_known_values_only() {
        assert_eq!("image".parse::<MessageKind>(), Ok(MessageKind::Image));
        assert_eq!("audio".parse::<MessageKind>(), Ok(MessageKind::Audio));
        assert!("video".parse::<MessageKind>().is_err());
    }

    #[test]
    fn message_serializes_kind_as_type() {
        let msg = Message {
            id: Uuid::nil(),
            from: "u1".into(),
            to: "u2".into(),
            text: "hi".into(),
            image: String::new(),
            audio: String::new(),
            kind: MessageKind::Text,
            read: false,
            created_at: DateTime::<Utc>::default(),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["from"], "u1");
        assert_eq!(json["read"], false);
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn payload_must_match_kind() {
        let mut msg = NewMessage::text("u1", "u2", "");
        assert!(!msg.payload_matches_kind());

        msg.audio = "http://host/uploads/a.webm".into();
        assert!(!msg.payload_matches_kind());
        msg.kind = MessageKind::Audio;
        assert!(msg.payload_matches_kind());

        // a caption alongside media is not accepted
        msg.text = "listen".into();
        assert!(!msg.payload_matches_kind());
    }
}
