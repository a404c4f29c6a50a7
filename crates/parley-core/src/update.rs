//! Inbound update model.
//!
//! These are the opaque records delivered by the messaging transport. The
//! framework only reads a handful of fields from them (text, sender, chat,
//! callback data); everything else is carried along untouched.
//!
//! ```text
//! Update { update_id, .. }
//! ├── message: Option<Message>
//! │   └── Message { message_id, from: Option<User>, chat: Chat, text }
//! └── callback_query: Option<CallbackQuery>
//!     └── CallbackQuery { id, from: User, message: Option<Message>, data }
//! ```

use serde::{Deserialize, Serialize};

/// One inbound event from the transport.
///
/// At most one of the payload variants is expected to be populated. An update
/// with none of them is still valid input; filters simply do not match it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Monotonic identifier assigned by the transport.
    pub update_id: i64,
    /// A new incoming message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// A button press on an inline keyboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// Creates an update carrying a message.
    pub fn message(update_id: i64, message: Message) -> Self {
        Self {
            update_id,
            message: Some(message),
            callback_query: None,
        }
    }

    /// Creates an update carrying a callback query.
    pub fn callback_query(update_id: i64, query: CallbackQuery) -> Self {
        Self {
            update_id,
            message: None,
            callback_query: Some(query),
        }
    }

    /// Returns a short name for the populated variant, used in logs.
    pub fn kind(&self) -> &'static str {
        if self.message.is_some() {
            "message"
        } else if self.callback_query.is_some() {
            "callback_query"
        } else {
            "unknown"
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier, unique inside its chat.
    pub message_id: i64,
    /// Sender. Empty for messages sent on behalf of channels.
    #[serde(default)]
    pub from: Option<User>,
    /// The chat the message belongs to.
    pub chat: Chat,
    /// Unix timestamp of when the message was sent.
    #[serde(default)]
    pub date: i64,
    /// UTF-8 text of the message, if it is a text message.
    #[serde(default)]
    pub text: Option<String>,
}

impl Message {
    /// Creates a text message from `from` in `chat`.
    pub fn text(message_id: i64, from: User, chat: Chat, text: impl Into<String>) -> Self {
        Self {
            message_id,
            from: Some(from),
            chat,
            date: 0,
            text: Some(text.into()),
        }
    }
}

/// A user or bot account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: i64,
    /// Whether this account is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Public username, without the leading `@`.
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// Creates a user with the given id and first name.
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            is_bot: false,
            first_name: first_name.into(),
            username: None,
        }
    }

    /// Sets the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Kind of chat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// One-to-one conversation with a user.
    #[default]
    Private,
    /// Small group.
    Group,
    /// Large group.
    Supergroup,
    /// Broadcast channel.
    Channel,
}

/// A conversation: private chat, group or channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    /// Unique identifier.
    pub id: i64,
    /// Kind of chat.
    #[serde(rename = "type", default)]
    pub kind: ChatKind,
    /// Title, for groups and channels.
    #[serde(default)]
    pub title: Option<String>,
    /// Username, for private chats and public groups.
    #[serde(default)]
    pub username: Option<String>,
}

impl Chat {
    /// Creates a private chat.
    pub fn private(id: i64) -> Self {
        Self {
            id,
            kind: ChatKind::Private,
            title: None,
            username: None,
        }
    }

    /// Creates a group chat with a title.
    pub fn group(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            kind: ChatKind::Group,
            title: Some(title.into()),
            username: None,
        }
    }
}

/// A button press on an inline keyboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Identifier used to answer the query.
    pub id: String,
    /// The user who pressed the button.
    pub from: User,
    /// The message the keyboard was attached to, when still available.
    #[serde(default)]
    pub message: Option<Message>,
    /// Data attached to the pressed button.
    #[serde(default)]
    pub data: Option<String>,
}

impl CallbackQuery {
    /// Creates a callback query with button data.
    pub fn new(id: impl Into<String>, from: User, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from,
            message: None,
            data: Some(data.into()),
        }
    }

    /// Attaches the originating message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_message_update() {
        let raw = r#"{
            "update_id": 7,
            "message": {
                "message_id": 3,
                "from": {"id": 42, "first_name": "Ada", "username": "ada"},
                "chat": {"id": 100, "type": "private"},
                "date": 1700000000,
                "text": "/start"
            }
        }"#;

        let update: Update = serde_json::from_str(raw).unwrap();
        assert_eq!(update.kind(), "message");

        let message = update.message.unwrap();
        assert_eq!(message.text.as_deref(), Some("/start"));
        assert_eq!(message.chat.kind, ChatKind::Private);
        assert_eq!(message.from.unwrap().username.as_deref(), Some("ada"));
    }

    #[test]
    fn test_update_without_payload_is_valid() {
        let update: Update = serde_json::from_str(r#"{"update_id": 1}"#).unwrap();
        assert_eq!(update.kind(), "unknown");
        assert!(update.message.is_none());
        assert!(update.callback_query.is_none());
    }
}
