//! Tower plumbing for handlers.
//!
//! [`HandlerService`] wraps a single [`Handler`] and implements
//! `tower::Service<Arc<Context>>`. Everything the router stores is erased
//! into a [`BoxedHandler`], so route handlers, middleware-wrapped chains and
//! scene hooks all share one type.

use std::marker::PhantomData;
use std::sync::Arc;
use std::task::Poll;

use futures::future::BoxFuture;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Service, ServiceExt};

use super::traits::Handler;
use crate::context::Context;
use crate::error::HandlerResult;

/// A type-erased, cloneable handler service.
pub type BoxedHandler = BoxCloneSyncService<Arc<Context>, (), BoxError>;

/// A tower [`Service`] that calls a single generic handler.
pub struct HandlerService<H, T> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<H, T> HandlerService<H, T> {
    /// Wraps `handler`.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

impl<H: Clone, T> Clone for HandlerService<H, T> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            _marker: PhantomData,
        }
    }
}

impl<H, T> Service<Arc<Context>> for HandlerService<H, T>
where
    H: Handler<T>,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<Context>) -> Self::Future {
        self.handler.clone().call(ctx)
    }
}

/// Erases a handler into a [`BoxedHandler`].
pub fn into_boxed<H, T>(handler: H) -> BoxedHandler
where
    H: Handler<T>,
    T: 'static,
{
    BoxCloneSyncService::new(HandlerService::new(handler))
}

/// Runs a boxed handler once against `ctx`.
pub async fn call_handler(handler: &BoxedHandler, ctx: Arc<Context>) -> HandlerResult {
    handler.clone().oneshot(ctx).await
}
