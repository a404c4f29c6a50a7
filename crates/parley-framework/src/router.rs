//! Update routing.
//!
//! A [`Router`] holds an ordered list of routes, each a [`Filter`] paired with
//! a fully composed handler. [`Router::handle`] scans the list in
//! registration order and runs the first route whose filter matches; nothing
//! else is tried, even if that handler fails. An update that matches no route
//! is a silent no-op.
//!
//! Middleware is composed when a route is registered, not when an update is
//! dispatched. [`Router::use_middleware`] therefore only affects routes added
//! after it:
//!
//! ```rust,ignore
//! let mut router = Router::new();
//! router.use_middleware([recover(), logger()]);
//! router.on(command("start"), start);
//!
//! let mut admin = router.sub(filter::chat_kind(ChatKind::Private), [require_admin()]);
//! admin.on(command("ban"), ban);
//! ```

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use parley_core::{BoxedBot, Update};

use crate::context::Context;
use crate::error::{BoxError, HandlerResult};
use crate::filter::Filter;
use crate::handler::{BoxedHandler, Handler, call_handler, into_boxed};
use crate::middleware::Middlewares;

/// Callback invoked with errors that reach [`Router::dispatch`].
pub type ErrorHandler = Arc<dyn Fn(&Arc<Context>, &BoxError) + Send + Sync>;

#[derive(Clone)]
struct Route {
    filter: Filter,
    handler: BoxedHandler,
}

/// An ordered, first-match-wins list of routes.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
    middlewares: Middlewares,
    error_handler: Option<ErrorHandler>,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the callback that receives errors in [`dispatch`](Self::dispatch).
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Arc<Context>, &BoxError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Appends router-level middleware for routes registered from now on.
    pub fn use_middleware(&mut self, middlewares: impl Into<Middlewares>) -> &mut Self {
        self.middlewares.extend(middlewares.into());
        self
    }

    /// Registers a route wrapped in the router-level middleware.
    pub fn on<H, T>(&mut self, filter: Filter, handler: H) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.on_with(filter, handler, Middlewares::new())
    }

    /// Registers a route wrapped in the router-level middleware followed by
    /// `extra`.
    pub fn on_with<H, T>(
        &mut self,
        filter: Filter,
        handler: H,
        extra: impl Into<Middlewares>,
    ) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        let chain = self.middlewares.concat(&extra.into());
        push_route(&mut self.routes, filter, &chain, into_boxed(handler));
        self
    }

    /// Opens a sub-router whose routes also require `filter` and are wrapped
    /// in the current router-level middleware followed by `extra`.
    ///
    /// Sub-router routes land in this router's route list at the position
    /// they are registered, so first-match-wins holds across the whole tree.
    pub fn sub(&mut self, filter: Filter, extra: impl Into<Middlewares>) -> SubRouter<'_> {
        SubRouter {
            filter,
            middlewares: self.middlewares.concat(&extra.into()),
            routes: &mut self.routes,
        }
    }

    /// Number of registered routes, including those added through sub-routers.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Runs the first matching route.
    pub async fn handle(&self, ctx: Arc<Context>) -> HandlerResult {
        let update_id = ctx.update().update_id;
        for (index, route) in self.routes.iter().enumerate() {
            if route.filter.check(&ctx) {
                debug!(update_id, route = index, "route matched");
                return call_handler(&route.handler, ctx).await;
            }
        }

        trace!(update_id, routes = self.routes.len(), "no route matched");
        Ok(())
    }

    /// Builds a [`Context`] for `update` and handles it.
    ///
    /// Errors go to the error handler when one is set and are dropped
    /// otherwise.
    pub async fn dispatch(&self, bot: BoxedBot, update: Update, token: CancellationToken) {
        let ctx = Arc::new(Context::new(update, bot, token));
        let Err(err) = self.handle(Arc::clone(&ctx)).await else {
            return;
        };

        match &self.error_handler {
            Some(handler) => handler(&ctx, &err),
            None => debug!(
                update_id = ctx.update().update_id,
                error = %err,
                "dropping unhandled dispatch error"
            ),
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("route_count", &self.routes.len())
            .field("middleware_count", &self.middlewares.len())
            .field("has_error_handler", &self.error_handler.is_some())
            .finish()
    }
}

/// A view on a [`Router`] that adds a filter and middleware to every route it
/// registers.
pub struct SubRouter<'a> {
    routes: &'a mut Vec<Route>,
    filter: Filter,
    middlewares: Middlewares,
}

impl SubRouter<'_> {
    /// Appends middleware for routes registered on this sub-router from now on.
    pub fn use_middleware(&mut self, middlewares: impl Into<Middlewares>) -> &mut Self {
        self.middlewares.extend(middlewares.into());
        self
    }

    /// Registers a route that requires the sub-router's filter and `filter`.
    pub fn on<H, T>(&mut self, filter: Filter, handler: H) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.on_with(filter, handler, Middlewares::new())
    }

    /// Like [`on`](Self::on) with additional route middleware.
    pub fn on_with<H, T>(
        &mut self,
        filter: Filter,
        handler: H,
        extra: impl Into<Middlewares>,
    ) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        let chain = self.middlewares.concat(&extra.into());
        let filter = self.filter.clone() & filter;
        push_route(self.routes, filter, &chain, into_boxed(handler));
        self
    }

    /// Opens a nested sub-router.
    pub fn sub(&mut self, filter: Filter, extra: impl Into<Middlewares>) -> SubRouter<'_> {
        SubRouter {
            filter: self.filter.clone() & filter,
            middlewares: self.middlewares.concat(&extra.into()),
            routes: &mut *self.routes,
        }
    }
}

impl fmt::Debug for SubRouter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubRouter")
            .field("middleware_count", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

fn push_route(routes: &mut Vec<Route>, filter: Filter, chain: &Middlewares, handler: BoxedHandler) {
    routes.push(Route {
        filter,
        handler: chain.apply(handler),
    });
}
