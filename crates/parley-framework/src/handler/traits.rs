//! The [`Handler`] trait.
//!
//! Handlers are plain async functions. Every parameter is pulled out of the
//! [`Context`] through [`FromContext`], and the return value is anything that
//! converts into a [`HandlerResult`]:
//!
//! ```rust,ignore
//! // No parameters, nothing to report
//! async fn ping() {}
//!
//! // Whole context, fallible
//! async fn start(ctx: Arc<Context>) -> Result<(), ApiError> {
//!     ctx.reply("hello").await?;
//!     Ok(())
//! }
//!
//! // Several extractors
//! async fn count(ctx: Arc<Context>, session: Session<Visits>) -> HandlerResult {
//!     let visits = session.update(|s| { s.visits += 1; s.visits });
//!     ctx.send(format!("visit #{visits}")).await?;
//!     Ok(())
//! }
//! ```
//!
//! A failed extraction is reported as the handler's error, so a handler that
//! asks for a `Session<T>` without the session middleware installed fails
//! loudly instead of being skipped.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::Context;
use crate::error::{BoxError, HandlerResult};
use crate::extractor::FromContext;

/// Conversion of a handler's return value into a [`HandlerResult`].
pub trait IntoHandlerResult {
    /// Performs the conversion.
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E> IntoHandlerResult for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

/// An async function usable as a route, hook or scene handler.
///
/// Implemented for `async fn`s and closures taking 0 to 8 [`FromContext`]
/// parameters. `T` is the tuple of parameter types and only serves to keep
/// the blanket implementations apart.
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// Extracts the parameters and runs the handler.
    fn call(self, ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut, R> Handler<()> for F
where
    F: FnOnce() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult,
{
    fn call(self, _ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async move { self().await.into_handler_result() })
    }
}

/// Generates [`Handler`] implementations for functions of different arities.
macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case)]
        impl<F, Fut, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoHandlerResult,
            $( $ty: FromContext + Send + 'static, )*
        {
            fn call(self, ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult> {
                Box::pin(async move {
                    $(
                        let $ty = $ty::from_context(&ctx)?;
                    )*

                    (self)($($ty,)*).await.into_handler_result()
                })
            }
        }
    };
}

impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

#[cfg(test)]
mod tests {
    use super::*;

    use parley_core::{Message, User};

    use crate::context::tests::{callback_update, context, text_update};
    use crate::error::ExtractError;

    async fn no_params() {}

    async fn echo_sender(user: User, message: Message) -> Result<(), ExtractError> {
        if user.id == 42 && message.text.as_deref() == Some("hi") {
            Ok(())
        } else {
            Err(ExtractError::custom("unexpected input"))
        }
    }

    async fn failing(_ctx: Arc<Context>) -> HandlerResult {
        Err("nope".into())
    }

    #[tokio::test]
    async fn test_zero_arity_handler() {
        let ctx = context(text_update(42, 1, "hi"));
        assert!(Handler::call(no_params, ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_extractors_feed_parameters() {
        let ctx = context(text_update(42, 1, "hi"));
        assert!(Handler::call(echo_sender, ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_extraction_is_an_error() {
        let ctx = context(callback_update(42, "x"));
        let err = Handler::call(echo_sender, ctx).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExtractError>(),
            Some(ExtractError::MissingMessage)
        ));
    }

    #[tokio::test]
    async fn test_handler_error_is_returned() {
        let ctx = context(text_update(1, 1, "x"));
        let err = Handler::call(failing, ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
