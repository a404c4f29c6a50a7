//! Per-update request logging.

use std::sync::Arc;
use std::task::Poll;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::Instant;
use tower::{BoxError, Layer, Service, ServiceExt};
use tracing::{Instrument, info, info_span};

use super::Middleware;
use crate::context::Context;
use crate::error::HandlerResult;
use crate::handler::BoxedHandler;

/// Returns a middleware that runs the chain below it inside an `update` span
/// and emits one `info` event when it finishes.
///
/// The event carries the elapsed time, the user id and username when known,
/// and the error if the chain failed. The result is returned untouched.
pub fn logger() -> Middleware {
    Middleware::layer(LoggerLayer)
}

/// The [`Layer`] behind [`logger`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerLayer;

impl Layer<BoxedHandler> for LoggerLayer {
    type Service = LoggerService;

    fn layer(&self, inner: BoxedHandler) -> Self::Service {
        LoggerService { inner }
    }
}

/// The [`Service`] behind [`logger`].
#[derive(Clone)]
pub struct LoggerService {
    inner: BoxedHandler,
}

impl Service<Arc<Context>> for LoggerService {
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<Context>) -> Self::Future {
        let span = info_span!(
            "update",
            update_id = ctx.update().update_id,
            kind = ctx.update().kind(),
        );
        let inner = self.inner.clone();

        async move {
            let started = Instant::now();
            let result = inner.oneshot(Arc::clone(&ctx)).await;
            let elapsed = started.elapsed();

            let user_id = ctx.user().map(|u| u.id);
            let username = ctx.user().and_then(|u| u.username.as_deref());
            match &result {
                Ok(()) => info!(?elapsed, ?user_id, ?username, "update processed"),
                Err(err) => info!(?elapsed, ?user_id, ?username, error = %err, "update processed"),
            }

            result
        }
        .instrument(span)
        .boxed()
    }
}
