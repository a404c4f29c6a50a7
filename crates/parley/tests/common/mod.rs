#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use parley::core::{
    AnswerCallbackQuery, ApiResult, Bot, BoxedBot, CallbackQuery, Chat, Message, SendMessage,
    Update, User,
};
use parley::framework::error::StoreResult;
use parley::framework::{MemoryStore, Router, SessionStore};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock transport
// ============================================================================

/// Records every outbound call instead of talking to a remote service.
#[derive(Default)]
pub struct MockBot {
    sent: Mutex<Vec<SendMessage>>,
    answered: Mutex<Vec<AnswerCallbackQuery>>,
}

impl MockBot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn boxed(self: &Arc<Self>) -> BoxedBot {
        Arc::clone(self) as BoxedBot
    }

    pub fn sent(&self) -> Vec<SendMessage> {
        self.sent.lock().clone()
    }

    /// `(chat_id, text)` of every sent message, in order.
    pub fn sent_texts(&self) -> Vec<(i64, String)> {
        self.sent
            .lock()
            .iter()
            .map(|m| (m.chat_id.unwrap_or_default(), m.text.clone()))
            .collect()
    }

    pub fn answered(&self) -> Vec<AnswerCallbackQuery> {
        self.answered.lock().clone()
    }
}

#[async_trait]
impl Bot for MockBot {
    fn id(&self) -> &str {
        "mock_bot"
    }

    async fn send_message(&self, params: SendMessage) -> ApiResult<Message> {
        let mut sent = self.sent.lock();
        let message = Message {
            message_id: 1000 + sent.len() as i64,
            from: None,
            chat: Chat::private(params.chat_id.unwrap_or_default()),
            date: 0,
            text: Some(params.text.clone()),
        };
        sent.push(params);
        Ok(message)
    }

    async fn answer_callback_query(&self, params: AnswerCallbackQuery) -> ApiResult<bool> {
        self.answered.lock().push(params);
        Ok(true)
    }
}

// ============================================================================
// Update builders
// ============================================================================

/// A private-chat text message from `user_id`, in the chat of the same id.
pub fn text(update_id: i64, user_id: i64, body: &str) -> Update {
    text_in(update_id, user_id, user_id, body)
}

pub fn text_in(update_id: i64, user_id: i64, chat_id: i64, body: &str) -> Update {
    Update::message(
        update_id,
        Message::text(
            update_id,
            User::new(user_id, format!("user{user_id}")),
            Chat::private(chat_id),
            body,
        ),
    )
}

pub fn callback(update_id: i64, user_id: i64, data: &str) -> Update {
    Update::callback_query(
        update_id,
        CallbackQuery::new(
            format!("cb-{update_id}"),
            User::new(user_id, format!("user{user_id}")),
            data,
        ),
    )
}

/// Dispatches each update in order, waiting for each to finish.
pub async fn dispatch_all(router: &Router, bot: &Arc<MockBot>, updates: Vec<Update>) {
    for update in updates {
        router
            .dispatch(bot.boxed(), update, CancellationToken::new())
            .await;
    }
}

// ============================================================================
// Store instrumentation
// ============================================================================

/// A [`MemoryStore`] that counts the calls made to it.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    gets: AtomicUsize,
    sets: AtomicUsize,
    deletes: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Decodes the JSON payload under `key`, bypassing the counters.
    pub async fn json(&self, key: &str) -> Option<serde_json::Value> {
        let raw = self.inner.get(key).await.ok()??;
        serde_json::from_slice(&raw).ok()
    }
}

#[async_trait]
impl SessionStore for CountingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }
}
