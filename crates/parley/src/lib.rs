//! # Parley
//!
//! A conversation-aware dispatch framework for chat bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────────────────────────────────────┐
//! │ transport  │──▶│ Dispatcher │──▶│ recover → logger → session → scene → ... │──▶ handler
//! │ (updates)  │   │ task/update│   │            Router (first match wins)     │
//! └────────────┘   └────────────┘   └──────────────────────────────────────────┘
//! ```
//!
//! - **Core**: the update model and the [`Bot`](parley_core::Bot) transport trait
//! - **Framework**: filters, handlers, middleware, routers, scenes and sessions
//! - **Runtime**: configuration, logging and the concurrent dispatcher
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parley::prelude::*;
//!
//! async fn start(ctx: Arc<Context>) -> HandlerResult {
//!     ctx.send("hello").await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> RuntimeResult<()> {
//!     let config = parley::runtime::config::load_config()?;
//!     parley::runtime::logging::init_from_config(&config.logging);
//!
//!     let mut router = Router::new();
//!     router.use_middleware([recover(), logger()]);
//!     router.on(filter::command("start"), start);
//!
//!     let dispatcher = Dispatcher::new(router, my_bot()).with_config(&config.dispatch);
//!     tokio::select! {
//!         () = dispatcher.run(my_updates()) => {}
//!         _ = wait_for_signal() => {}
//!     }
//!     dispatcher.shutdown().await
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: read `parley.toml`
//! - `yaml-config`: read `parley.yaml`
//! - `json-log`: JSON log lines

pub use parley_core as core;
pub use parley_framework as framework;
pub use parley_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use parley::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Update model and transport
    pub use parley_core::{
        AnswerCallbackQuery, ApiError, Bot, BoxedBot, CallbackQuery, Chat, Message, SendMessage,
        Update, User,
    };

    // Routing and handlers
    pub use parley_framework::filter::{self, Filter};
    pub use parley_framework::{
        BoxError, Context, FromContext, HandlerResult, Middleware, Middlewares, Next, Router,
        State, from_fn, logger, recover,
    };

    // Conversation state
    pub use parley_framework::{
        FailurePolicy, MemoryStore, Scene, SceneControl, SceneManager, Session, SessionData,
        SessionManager, SessionMap, SessionStore,
    };

    // Runtime
    pub use parley_runtime::{
        Dispatcher, ParleyConfig, RuntimeError, RuntimeResult, wait_for_signal,
    };
}
