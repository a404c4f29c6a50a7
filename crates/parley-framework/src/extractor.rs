//! Handler parameter extraction.
//!
//! Any type implementing [`FromContext`] can appear as a handler parameter.
//! Extraction runs before the handler body; the first failure becomes the
//! handler's error. Wrap a parameter in `Option<T>` to make it optional.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use parley_core::{BoxedBot, CallbackQuery, Chat, Message, Update, User};

use crate::context::Context;
use crate::error::{ExtractError, ExtractResult};

/// A type that can be extracted from a [`Context`].
pub trait FromContext: Sized {
    /// Attempts to extract this type from the given context.
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self>;
}

impl FromContext for Arc<Context> {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        Ok(Arc::clone(ctx))
    }
}

impl FromContext for Update {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        Ok(ctx.update().clone())
    }
}

impl FromContext for Message {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        ctx.message().cloned().ok_or(ExtractError::MissingMessage)
    }
}

impl FromContext for CallbackQuery {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        ctx.callback_query()
            .cloned()
            .ok_or(ExtractError::MissingCallbackQuery)
    }
}

impl FromContext for User {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        ctx.user().cloned().ok_or(ExtractError::MissingUser)
    }
}

impl FromContext for Chat {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        ctx.chat().cloned().ok_or(ExtractError::MissingChat)
    }
}

impl FromContext for BoxedBot {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        Ok(Arc::clone(ctx.bot()))
    }
}

impl FromContext for CancellationToken {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        Ok(ctx.cancellation_token().clone())
    }
}

/// `Option<T>` never fails: a missing value becomes `None`.
impl<T: FromContext> FromContext for Option<T> {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        Ok(T::from_context(ctx).ok())
    }
}

/// Extracts a value that middleware stored with
/// [`Context::insert_state`].
///
/// ```rust,ignore
/// #[derive(Clone)]
/// struct Db(Pool);
///
/// async fn handler(State(db): State<Db>) { /* ... */ }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct State<T>(pub T);

impl<T: Clone + Send + Sync + 'static> FromContext for State<T> {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        ctx.require_state::<T>().map(State)
    }
}

impl<T> Deref for State<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for State<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::context::tests::{callback_update, context, text_update};

    #[test]
    fn test_message_extractors() {
        let ctx = context(text_update(42, 100, "hi"));
        assert_eq!(Message::from_context(&ctx).unwrap().message_id, 10);
        assert_eq!(User::from_context(&ctx).unwrap().id, 42);
        assert_eq!(Chat::from_context(&ctx).unwrap().id, 100);
        assert!(matches!(
            CallbackQuery::from_context(&ctx),
            Err(ExtractError::MissingCallbackQuery)
        ));
    }

    #[test]
    fn test_callback_extractors() {
        let ctx = context(callback_update(7, "x"));
        assert_eq!(CallbackQuery::from_context(&ctx).unwrap().id, "cb-1");
        assert!(matches!(
            Chat::from_context(&ctx),
            Err(ExtractError::MissingChat)
        ));
        assert!(Option::<Message>::from_context(&ctx).unwrap().is_none());
    }

    #[test]
    fn test_state_extractor() {
        #[derive(Clone)]
        struct Greeting(&'static str);

        let ctx = context(Update::default());
        assert!(matches!(
            State::<Greeting>::from_context(&ctx),
            Err(ExtractError::MissingState(_))
        ));

        ctx.insert_state(Greeting("hey"));
        let State(greeting) = State::<Greeting>::from_context(&ctx).unwrap();
        assert_eq!(greeting.0, "hey");
    }

    #[test]
    fn test_context_extractor_shares_state() {
        let ctx = context(Update::default());
        let extracted = Arc::<Context>::from_context(&ctx).unwrap();
        assert!(Arc::ptr_eq(&ctx, &extracted));
    }
}
