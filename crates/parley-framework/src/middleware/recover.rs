//! Panic recovery.
//!
//! By the time `catch_unwind` returns, the panicking frames are gone. A
//! process-wide panic hook, chained in front of the previous one, records the
//! location and backtrace on the panicking thread so the middleware can attach
//! them to the [`PanicError`].

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};
use std::task::Poll;

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::{BoxError, Layer, Service, ServiceExt};
use tracing::error;

use super::Middleware;
use crate::context::Context;
use crate::error::{HandlerResult, PanicError};
use crate::handler::BoxedHandler;

struct PanicTrace {
    location: Option<String>,
    backtrace: String,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicTrace>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

fn install_panic_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = PanicTrace {
                location: info.location().map(ToString::to_string),
                backtrace: Backtrace::force_capture().to_string(),
            };
            // Fails only while the thread's locals are being torn down.
            let _ = LAST_PANIC.try_with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> PanicTrace {
    LAST_PANIC
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
        .unwrap_or_else(|| PanicTrace {
            location: None,
            backtrace: Backtrace::force_capture().to_string(),
        })
}

/// Returns a middleware that converts a panic anywhere below it into a
/// [`PanicError`].
///
/// Install it first in the router-level list so that it wraps every other
/// middleware as well as the handler. The first call installs the panic hook
/// that records where the panic happened.
pub fn recover() -> Middleware {
    install_panic_hook();
    Middleware::layer(RecoverLayer)
}

/// The [`Layer`] behind [`recover`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverLayer;

impl Layer<BoxedHandler> for RecoverLayer {
    type Service = RecoverService;

    fn layer(&self, inner: BoxedHandler) -> Self::Service {
        RecoverService { inner }
    }
}

/// The [`Service`] behind [`recover`].
#[derive(Clone)]
pub struct RecoverService {
    inner: BoxedHandler,
}

impl Service<Arc<Context>> for RecoverService {
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<Context>) -> Self::Future {
        let update_id = ctx.update().update_id;
        let call = self.inner.clone().oneshot(ctx);
        async move {
            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let trace = take_panic_trace();
                    let err = PanicError::new(payload, trace.location, trace.backtrace);
                    error!(
                        update_id,
                        panic = %err.message,
                        location = err.location.as_deref().unwrap_or("unknown"),
                        "handler panicked"
                    );
                    Err(err.into())
                }
            }
        }
        .boxed()
    }
}
