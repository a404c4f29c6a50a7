//! Middleware: decorators around a [`BoxedHandler`].
//!
//! A [`Middleware`] turns one handler into another. It is built either from
//! any tower [`Layer`] whose service speaks `Arc<Context>` ([`Middleware::layer`])
//! or from an async function that receives the context and a [`Next`]
//! ([`from_fn`]):
//!
//! ```rust,ignore
//! async fn timing(ctx: Arc<Context>, next: Next) -> HandlerResult {
//!     let started = Instant::now();
//!     let result = next.run(ctx).await;
//!     tracing::debug!(elapsed = ?started.elapsed());
//!     result
//! }
//!
//! router.use_middleware([recover(), logger(), middleware::from_fn(timing)]);
//! ```
//!
//! A [`Middlewares`] list is applied right to left, so the first entry is the
//! outermost: for `[m1, m2]` the call order is
//! `m1 → m2 → handler → m2 → m1`.

mod logger;
mod recover;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::task::Poll;

use futures::future::BoxFuture;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Layer, Service, ServiceExt};

use crate::context::Context;
use crate::error::HandlerResult;
use crate::handler::{BoxedHandler, IntoHandlerResult};

pub use logger::{LoggerLayer, LoggerService, logger};
pub use recover::{RecoverLayer, RecoverService, recover};

/// A cloneable decorator `BoxedHandler -> BoxedHandler`.
#[derive(Clone)]
pub struct Middleware(Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync>);

impl Middleware {
    /// Creates a middleware from a wrapping function.
    pub fn new<F>(wrap: F) -> Self
    where
        F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        Self(Arc::new(wrap))
    }

    /// Creates a middleware from a tower [`Layer`].
    pub fn layer<L>(layer: L) -> Self
    where
        L: Layer<BoxedHandler> + Send + Sync + 'static,
        L::Service: Service<Arc<Context>, Response = (), Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as Service<Arc<Context>>>::Future: Send + 'static,
    {
        Self::new(move |inner| BoxCloneSyncService::new(layer.layer(inner)))
    }

    /// Wraps `handler`.
    pub fn wrap(&self, handler: BoxedHandler) -> BoxedHandler {
        (self.0)(handler)
    }
}

impl Layer<BoxedHandler> for Middleware {
    type Service = BoxedHandler;

    fn layer(&self, inner: BoxedHandler) -> BoxedHandler {
        self.wrap(inner)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

/// An ordered middleware list.
#[derive(Clone, Debug, Default)]
pub struct Middlewares(Vec<Middleware>);

impl Middlewares {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one middleware.
    pub fn push(&mut self, middleware: Middleware) {
        self.0.push(middleware);
    }

    /// Returns a new list holding `self` followed by `other`.
    pub fn concat(&self, other: &Middlewares) -> Middlewares {
        let mut all = self.0.clone();
        all.extend(other.0.iter().cloned());
        Middlewares(all)
    }

    /// Number of middleware in the list.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wraps `handler` so that the first middleware runs outermost.
    pub fn apply(&self, handler: BoxedHandler) -> BoxedHandler {
        self.0.iter().rev().fold(handler, |inner, m| m.wrap(inner))
    }
}

impl FromIterator<Middleware> for Middlewares {
    fn from_iter<I: IntoIterator<Item = Middleware>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Middlewares {
    type Item = Middleware;
    type IntoIter = std::vec::IntoIter<Middleware>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Extend<Middleware> for Middlewares {
    fn extend<I: IntoIterator<Item = Middleware>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<const N: usize> From<[Middleware; N]> for Middlewares {
    fn from(list: [Middleware; N]) -> Self {
        Self(list.into())
    }
}

impl From<Vec<Middleware>> for Middlewares {
    fn from(list: Vec<Middleware>) -> Self {
        Self(list)
    }
}

impl From<Middleware> for Middlewares {
    fn from(middleware: Middleware) -> Self {
        Self(vec![middleware])
    }
}

// =============================================================================
// from_fn
// =============================================================================

/// The rest of the chain, as seen from inside a [`from_fn`] middleware.
#[derive(Clone)]
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    /// Runs the rest of the chain.
    pub async fn run(self, ctx: Arc<Context>) -> HandlerResult {
        self.inner.oneshot(ctx).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Next")
    }
}

/// Creates a middleware from an async function `(Arc<Context>, Next) -> R`.
///
/// The function decides whether and when to call [`Next::run`]; not calling
/// it short-circuits the chain.
pub fn from_fn<F, Fut, R>(f: F) -> Middleware
where
    F: Fn(Arc<Context>, Next) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult,
{
    Middleware::layer(FromFnLayer { f })
}

/// The [`Layer`] behind [`from_fn`].
#[derive(Clone)]
pub struct FromFnLayer<F> {
    f: F,
}

impl<F: Clone> Layer<BoxedHandler> for FromFnLayer<F> {
    type Service = FromFnService<F>;

    fn layer(&self, inner: BoxedHandler) -> Self::Service {
        FromFnService {
            f: self.f.clone(),
            inner,
        }
    }
}

/// The [`Service`] behind [`from_fn`].
#[derive(Clone)]
pub struct FromFnService<F> {
    f: F,
    inner: BoxedHandler,
}

impl<F, Fut, R> Service<Arc<Context>> for FromFnService<F>
where
    F: Fn(Arc<Context>, Next) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<Context>) -> Self::Future {
        let next = Next {
            inner: self.inner.clone(),
        };
        let fut = (self.f)(ctx, next);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use parking_lot::Mutex;

    use crate::context::tests::{context, text_update};
    use crate::handler::{call_handler, into_boxed};

    pub(crate) type Trace = Arc<Mutex<Vec<String>>>;

    /// A middleware that records `<name>-enter` and `<name>-exit` around next.
    pub(crate) fn tracing_mw(name: &'static str, trace: Trace) -> Middleware {
        from_fn(move |ctx: Arc<Context>, next: Next| {
            let trace = trace.clone();
            async move {
                trace.lock().push(format!("{name}-enter"));
                let result = next.run(ctx).await;
                trace.lock().push(format!("{name}-exit"));
                result
            }
        })
    }

    pub(crate) fn recording_handler(name: &'static str, trace: Trace) -> BoxedHandler {
        into_boxed(move || {
            let trace = trace.clone();
            async move {
                trace.lock().push(name.to_string());
            }
        })
    }

    #[tokio::test]
    async fn test_first_middleware_is_outermost() {
        let trace = Trace::default();
        let chain = Middlewares::from([
            tracing_mw("m1", trace.clone()),
            tracing_mw("m2", trace.clone()),
        ]);
        let handler = chain.apply(recording_handler("h", trace.clone()));

        call_handler(&handler, context(text_update(1, 1, "x")))
            .await
            .unwrap();

        assert_eq!(
            *trace.lock(),
            ["m1-enter", "m2-enter", "h", "m2-exit", "m1-exit"]
        );
    }

    #[tokio::test]
    async fn test_chain_concatenation_is_associative() {
        let trace = Trace::default();
        let m = |name| tracing_mw(name, trace.clone());
        let h = || recording_handler("h", trace.clone());

        let flat = Middlewares::from([m("m1"), m("m2"), m("m3")]).apply(h());
        let left = Middlewares::from([m("m1"), m("m2")])
            .concat(&Middlewares::from(m("m3")))
            .apply(h());
        let right = Middlewares::from(m("m1"))
            .concat(&Middlewares::from([m("m2"), m("m3")]))
            .apply(h());
        let nested = Middlewares::from([m("m1"), m("m2")]).apply(Middlewares::from(m("m3")).apply(h()));

        let mut traces = Vec::new();
        for handler in [flat, left, right, nested] {
            trace.lock().clear();
            call_handler(&handler, context(text_update(1, 1, "x")))
                .await
                .unwrap();
            traces.push(trace.lock().clone());
        }

        assert_eq!(
            traces[0],
            ["m1-enter", "m2-enter", "m3-enter", "h", "m3-exit", "m2-exit", "m1-exit"]
        );
        assert!(traces.iter().all(|t| *t == traces[0]));
    }

    #[tokio::test]
    async fn test_from_fn_can_short_circuit() {
        let trace = Trace::default();
        let gate = from_fn(|_ctx: Arc<Context>, _next: Next| async { Err::<(), _>("blocked") });
        let handler = Middlewares::from(gate).apply(recording_handler("h", trace.clone()));

        let err = call_handler(&handler, context(text_update(1, 1, "x")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "blocked");
        assert!(trace.lock().is_empty());
    }

    #[tokio::test]
    async fn test_tower_layer_as_middleware() {
        let trace = Trace::default();
        let handler = Middlewares::from(Middleware::layer(tower::layer::layer_fn(
            |inner: BoxedHandler| inner,
        )))
        .apply(recording_handler("h", trace.clone()));

        call_handler(&handler, context(text_update(1, 1, "x")))
            .await
            .unwrap();
        assert_eq!(*trace.lock(), ["h"]);
    }
}
