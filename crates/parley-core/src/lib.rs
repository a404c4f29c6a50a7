//! # Parley Core
//!
//! The data model and transport boundary of the Parley bot framework.
//!
//! This crate is deliberately small:
//! - **Updates**: the inbound event records ([`Update`], [`Message`],
//!   [`CallbackQuery`], [`User`], [`Chat`])
//! - **Bot**: the outbound transport abstraction ([`Bot`], [`BoxedBot`]) and
//!   its request types
//! - **Errors**: [`ApiError`] for failed outbound calls
//!
//! Routing, middleware, scenes and sessions live in `parley-framework`.

pub mod bot;
pub mod error;
pub mod update;

pub use bot::{AnswerCallbackQuery, Bot, BoxedBot, SendMessage};
pub use error::{ApiError, ApiResult};
pub use update::{CallbackQuery, Chat, ChatKind, Message, Update, User};
