//! Per-update context.
//!
//! One [`Context`] is created for every inbound update, wrapped in an `Arc`
//! and handed through the whole middleware chain down to the handler. It
//! carries:
//!
//! - the [`Update`] itself and accessors that resolve the message, callback
//!   query, chat and user from whichever variant is populated;
//! - the transport handle ([`BoxedBot`]) with `send`/`reply`/`answer`
//!   helpers;
//! - the update's [`CancellationToken`], which every outbound call races
//!   against;
//! - a typed state map used by middleware to hand data (session handles,
//!   scene control) to handlers without changing handler signatures.
//!
//! The state map is keyed by [`TypeId`], so two layers can never collide on
//! a key and a lookup can never return a value of the wrong type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use parley_core::{
    AnswerCallbackQuery, ApiError, ApiResult, BoxedBot, CallbackQuery, Chat, Message, SendMessage,
    Update, User,
};

use crate::error::{ExtractError, ExtractResult};
use crate::scene::SceneControl;

/// The context object passed to middleware and handlers for one update.
pub struct Context {
    update: Update,
    bot: BoxedBot,
    token: CancellationToken,
    state: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl Context {
    /// Creates a new context for `update`.
    pub fn new(update: Update, bot: BoxedBot, token: CancellationToken) -> Self {
        Self {
            update,
            bot,
            token,
            state: Mutex::new(HashMap::new()),
        }
    }

    // ─── Update accessors ─────────────────────────────────────────────────────

    /// Returns the inbound update.
    pub fn update(&self) -> &Update {
        &self.update
    }

    /// Returns the message, if the update carries one.
    pub fn message(&self) -> Option<&Message> {
        self.update.message.as_ref()
    }

    /// Returns the callback query, if the update carries one.
    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        self.update.callback_query.as_ref()
    }

    /// Returns the text of the message, if any.
    pub fn text(&self) -> Option<&str> {
        self.message().and_then(|m| m.text.as_deref())
    }

    /// Resolves the chat: the message's chat first, then the chat of the
    /// message a callback query is attached to.
    pub fn chat(&self) -> Option<&Chat> {
        if let Some(message) = self.message() {
            return Some(&message.chat);
        }
        self.callback_query()
            .and_then(|q| q.message.as_ref())
            .map(|m| &m.chat)
    }

    /// Resolves the user: the message sender first, then the user who
    /// pressed the callback button.
    pub fn user(&self) -> Option<&User> {
        match (self.message(), self.callback_query()) {
            (Some(message), _) => message.from.as_ref(),
            (None, Some(query)) => Some(&query.from),
            (None, None) => None,
        }
    }

    // ─── Transport ────────────────────────────────────────────────────────────

    /// Returns the transport handle.
    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    /// Returns the update's cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns `true` once the update has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Runs an outbound call, failing with [`ApiError::Cancelled`] as soon as
    /// the update is cancelled.
    pub async fn cancellable<T, F>(&self, call: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(ApiError::Cancelled),
            result = call => result,
        }
    }

    /// Sends `text` to the current chat.
    pub async fn send(&self, text: impl Into<String>) -> ApiResult<Message> {
        self.send_with(SendMessage::new(text)).await
    }

    /// Sends `text` to the current chat as a reply to the inbound message.
    pub async fn reply(&self, text: impl Into<String>) -> ApiResult<Message> {
        let mut params = SendMessage::new(text);
        params.reply_to_message_id = self.message().map(|m| m.message_id);
        self.send_with(params).await
    }

    /// Sends a message, filling the chat from the update when unset.
    pub async fn send_with(&self, mut params: SendMessage) -> ApiResult<Message> {
        if params.chat_id.is_none() {
            params.chat_id = Some(self.chat().ok_or(ApiError::MissingChat)?.id);
        }
        self.cancellable(self.bot.send_message(params)).await
    }

    /// Answers the callback query without a notification.
    pub async fn answer(&self) -> ApiResult<bool> {
        self.answer_with(AnswerCallbackQuery::default()).await
    }

    /// Answers a callback query, filling its id from the update when unset.
    pub async fn answer_with(&self, mut params: AnswerCallbackQuery) -> ApiResult<bool> {
        if params.callback_query_id.is_empty() {
            params
                .callback_query_id
                .clone_from(&self.callback_query().ok_or(ApiError::MissingCallbackQuery)?.id);
        }
        self.cancellable(self.bot.answer_callback_query(params)).await
    }

    // ─── Typed state ──────────────────────────────────────────────────────────

    /// Stores a value in the state map, replacing any previous value of the
    /// same type.
    pub fn insert_state<T: Send + Sync + 'static>(&self, value: T) {
        self.state.lock().insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a cloned value from the state map.
    pub fn state<T: Clone + 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Like [`state`](Self::state) but fails with a typed error naming `T`.
    pub fn require_state<T: Clone + 'static>(&self) -> ExtractResult<T> {
        self.state::<T>()
            .ok_or(ExtractError::MissingState(std::any::type_name::<T>()))
    }

    /// Returns `true` if a value of type `T` is stored.
    pub fn has_state<T: 'static>(&self) -> bool {
        self.state.lock().contains_key(&TypeId::of::<T>())
    }

    /// Removes and returns a value from the state map.
    pub fn remove_state<T: 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    /// Returns the scene control installed by the scene middleware.
    pub fn scene(&self) -> Option<SceneControl> {
        self.state::<SceneControl>()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("update", &self.update)
            .field("bot", &self.bot.id())
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use parley_core::{Bot, Chat, User};

    /// A bot that records every outbound request.
    #[derive(Default)]
    pub(crate) struct RecordingBot {
        pub(crate) sent: Mutex<Vec<SendMessage>>,
        pub(crate) answered: Mutex<Vec<AnswerCallbackQuery>>,
    }

    #[async_trait]
    impl Bot for RecordingBot {
        fn id(&self) -> &str {
            "recording-bot"
        }

        async fn send_message(&self, params: SendMessage) -> ApiResult<Message> {
            let chat = Chat::private(params.chat_id.unwrap_or_default());
            let message = Message {
                message_id: 1,
                from: None,
                chat,
                date: 0,
                text: Some(params.text.clone()),
            };
            self.sent.lock().push(params);
            Ok(message)
        }

        async fn answer_callback_query(&self, params: AnswerCallbackQuery) -> ApiResult<bool> {
            self.answered.lock().push(params);
            Ok(true)
        }
    }

    /// A bot whose calls never complete.
    pub(crate) struct HangingBot;

    #[async_trait]
    impl Bot for HangingBot {
        fn id(&self) -> &str {
            "hanging-bot"
        }

        async fn send_message(&self, _params: SendMessage) -> ApiResult<Message> {
            std::future::pending().await
        }

        async fn answer_callback_query(&self, _params: AnswerCallbackQuery) -> ApiResult<bool> {
            std::future::pending().await
        }
    }

    pub(crate) fn text_update(user_id: i64, chat_id: i64, text: &str) -> Update {
        Update::message(
            1,
            Message::text(
                10,
                User::new(user_id, "tester").with_username("tester"),
                Chat::private(chat_id),
                text,
            ),
        )
    }

    pub(crate) fn callback_update(user_id: i64, data: &str) -> Update {
        Update::callback_query(2, CallbackQuery::new("cb-1", User::new(user_id, "tester"), data))
    }

    pub(crate) fn context_with(bot: Arc<dyn Bot>, update: Update) -> Arc<Context> {
        Arc::new(Context::new(update, bot, CancellationToken::new()))
    }

    pub(crate) fn context(update: Update) -> Arc<Context> {
        context_with(Arc::new(RecordingBot::default()), update)
    }

    #[test]
    fn test_user_prefers_message_sender() {
        let ctx = context(text_update(42, 100, "hi"));
        assert_eq!(ctx.user().map(|u| u.id), Some(42));
        assert_eq!(ctx.chat().map(|c| c.id), Some(100));
        assert_eq!(ctx.text(), Some("hi"));
    }

    #[test]
    fn test_callback_query_resolution() {
        let ctx = context(callback_update(7, "yes"));
        assert!(ctx.message().is_none());
        assert_eq!(ctx.user().map(|u| u.id), Some(7));
        assert!(ctx.chat().is_none());

        let query = CallbackQuery::new("cb", User::new(7, "t"), "yes").with_message(Message::text(
            5,
            User::new(1, "bot"),
            Chat::group(-200, "g"),
            "pick one",
        ));
        let ctx = context(Update::callback_query(3, query));
        assert_eq!(ctx.chat().map(|c| c.id), Some(-200));
        assert_eq!(ctx.user().map(|u| u.id), Some(7));
    }

    #[test]
    fn test_empty_update_resolves_nothing() {
        let ctx = context(Update::default());
        assert!(ctx.user().is_none());
        assert!(ctx.chat().is_none());
        assert!(ctx.text().is_none());
    }

    #[test]
    fn test_typed_state() {
        #[derive(Clone, Debug, PartialEq)]
        struct Marker(u32);

        let ctx = context(Update::default());
        assert!(!ctx.has_state::<Marker>());
        assert!(matches!(
            ctx.require_state::<Marker>(),
            Err(ExtractError::MissingState(_))
        ));

        ctx.insert_state(Marker(1));
        ctx.insert_state(5_u32);
        assert_eq!(ctx.state::<Marker>(), Some(Marker(1)));
        assert_eq!(ctx.state::<u32>(), Some(5));

        assert_eq!(ctx.remove_state::<Marker>(), Some(Marker(1)));
        assert!(!ctx.has_state::<Marker>());
    }

    #[tokio::test]
    async fn test_reply_targets_chat_and_message() {
        let bot = Arc::new(RecordingBot::default());
        let ctx = context_with(bot.clone(), text_update(42, 100, "/start"));

        ctx.reply("hello").await.unwrap();

        let sent = bot.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, Some(100));
        assert_eq!(sent[0].reply_to_message_id, Some(10));
        assert_eq!(sent[0].text, "hello");
    }

    #[tokio::test]
    async fn test_send_without_chat_fails() {
        let ctx = context(callback_update(7, "x"));
        assert!(matches!(ctx.send("hi").await, Err(ApiError::MissingChat)));
    }

    #[tokio::test]
    async fn test_answer_fills_query_id() {
        let bot = Arc::new(RecordingBot::default());
        let ctx = context_with(bot.clone(), callback_update(7, "x"));
        assert!(ctx.answer().await.unwrap());
        assert_eq!(bot.answered.lock()[0].callback_query_id, "cb-1");

        let ctx = context(text_update(1, 1, "hi"));
        assert!(matches!(
            ctx.answer().await,
            Err(ApiError::MissingCallbackQuery)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_context_aborts_outbound_call() {
        let ctx = context_with(Arc::new(HangingBot), text_update(1, 1, "hi"));
        ctx.cancellation_token().cancel();
        assert!(matches!(ctx.send("hi").await, Err(ApiError::Cancelled)));
    }
}
