//! Concurrent update dispatch with graceful shutdown.
//!
//! Every update runs on its own task under a child of the dispatcher's
//! cancellation token. Updates for the same user are not serialized.
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(router, bot).with_config(&config.dispatch);
//!
//! tokio::select! {
//!     () = dispatcher.run(updates) => {}
//!     _ = wait_for_signal() => {}
//! }
//! dispatcher.shutdown().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use parley_core::{BoxedBot, Update};
use parley_framework::Router;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::config::DispatchConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Feeds updates into a [`Router`], one task per update.
///
/// Cloning yields a handle to the same dispatcher, so one clone can
/// [`run`](Self::run) while another calls [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
    bot: BoxedBot,
    tracker: TaskTracker,
    token: CancellationToken,
    shutdown_timeout: Duration,
}

impl Dispatcher {
    pub fn new(router: Router, bot: BoxedBot) -> Self {
        Self {
            router: Arc::new(router),
            bot,
            tracker: TaskTracker::new(),
            token: CancellationToken::new(),
            shutdown_timeout: DispatchConfig::default().shutdown_timeout(),
        }
    }

    /// Applies the dispatch section of the configuration.
    pub fn with_config(self, config: &DispatchConfig) -> Self {
        self.shutdown_timeout(config.shutdown_timeout())
    }

    /// Sets how long [`shutdown`](Self::shutdown) waits for in-flight updates.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Number of updates still being handled.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawns a task handling `update`.
    ///
    /// Returns `false`, dropping the update, after shutdown has begun.
    pub fn dispatch(&self, update: Update) -> bool {
        if self.token.is_cancelled() {
            warn!(
                update_id = update.update_id,
                "dispatcher is shut down, dropping update"
            );
            return false;
        }

        let router = Arc::clone(&self.router);
        let bot = Arc::clone(&self.bot);
        let token = self.token.child_token();
        trace!(update_id = update.update_id, "dispatching update");
        self.tracker.spawn(async move {
            router.dispatch(bot, update, token).await;
        });
        true
    }

    /// Dispatches every update from `updates` until the stream ends or the
    /// dispatcher is shut down.
    ///
    /// Returns without waiting for the spawned tasks; see
    /// [`drain`](Self::drain) and [`shutdown`](Self::shutdown).
    pub async fn run<S>(&self, updates: S)
    where
        S: Stream<Item = Update> + Send,
    {
        let mut updates = std::pin::pin!(updates);
        info!("dispatcher running");

        loop {
            tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    debug!("dispatcher stopped by shutdown");
                    break;
                }
                next = updates.next() => match next {
                    Some(update) => {
                        self.dispatch(update);
                    }
                    None => {
                        debug!("update stream ended");
                        break;
                    }
                },
            }
        }
    }

    /// Waits for every in-flight update without cancelling them.
    ///
    /// The tracker stays closed if shutdown began meanwhile.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        if !self.token.is_cancelled() {
            self.tracker.reopen();
        }
    }

    /// Cancels every in-flight update and waits for the tasks to finish, up
    /// to the shutdown timeout.
    ///
    /// No update is accepted afterwards.
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        let pending = self.tracker.len();
        info!(pending, timeout = ?self.shutdown_timeout, "dispatcher shutting down");

        self.token.cancel();
        self.tracker.close();

        match tokio::time::timeout(self.shutdown_timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("dispatcher shut down");
                Ok(())
            }
            Err(_) => {
                let pending = self.tracker.len();
                warn!(pending, "shutdown timed out with updates still running");
                Err(RuntimeError::ShutdownTimeout { pending })
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bot", &self.bot.id())
            .field("in_flight", &self.tracker.len())
            .field("shut_down", &self.token.is_cancelled())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

/// Resolves on Ctrl+C, or on SIGTERM on Unix.
pub async fn wait_for_signal() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("received Ctrl+C");
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("received Ctrl+C");
    }

    Ok(())
}
