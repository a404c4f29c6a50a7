//! Bot trait and outbound request types.
//!
//! This module defines the [`Bot`] trait, the boundary between the dispatch
//! core and the transport client that talks to the remote messaging service.
//! The core never performs network I/O itself; every outbound call goes
//! through a [`BoxedBot`] carried by the per-update context.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::update::Message;

/// Parameters for sending a text message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendMessage {
    /// Target chat. Left empty, it is filled from the current update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    /// Message text.
    pub text: String,
    /// Message to reply to, inside the same chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
}

impl SendMessage {
    /// Creates a request with the given text and no target chat.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            chat_id: None,
            text: text.into(),
            reply_to_message_id: None,
        }
    }

    /// Sets the target chat.
    pub fn chat_id(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }

    /// Marks the message as a reply.
    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }
}

/// Parameters for answering a callback query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerCallbackQuery {
    /// Query to answer. Left empty, it is filled from the current update.
    #[serde(default)]
    pub callback_query_id: String,
    /// Notification text shown to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Show an alert instead of a transient notification.
    #[serde(default)]
    pub show_alert: bool,
}

impl AnswerCallbackQuery {
    /// Sets the notification text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// The transport client as seen by the dispatch core.
///
/// Implementations wrap a concrete messaging API. Both methods may block on
/// network I/O; callers race them against the update's cancellation token,
/// so implementations do not need to observe cancellation themselves but
/// must be safe to drop mid-flight.
#[async_trait]
pub trait Bot: Send + Sync + 'static {
    /// Returns the bot's identifier (typically its username).
    fn id(&self) -> &str;

    /// Sends a text message. `params.chat_id` is always set when called
    /// through the context helpers.
    async fn send_message(&self, params: SendMessage) -> ApiResult<Message>;

    /// Answers a callback query.
    async fn answer_callback_query(&self, params: AnswerCallbackQuery) -> ApiResult<bool>;
}

/// A shared Bot trait object.
pub type BoxedBot = Arc<dyn Bot>;
