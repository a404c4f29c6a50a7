//! Session loading and reconciliation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tower::{BoxError, Layer, Service, ServiceExt};
use tracing::{error, trace, warn};

use super::memory::MemoryStore;
use super::store::BoxedStore;
use super::{Factory, Session, SessionData};
use crate::context::Context;
use crate::error::{HandlerResult, SessionError, StoreResult};
use crate::handler::BoxedHandler;
use crate::middleware::Middleware;

/// Default session lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Sweep interval of the default in-memory store.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Prefix of the default session key.
pub const DEFAULT_KEY_PREFIX: &str = "session";

/// What the session middleware does when it cannot derive a key or encode
/// the session.
///
/// Store errors and corrupt stored data always fail the dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Fail the dispatch.
    #[default]
    Strict,
    /// Log and carry on: without a session when no key can be derived, and
    /// without saving when the value cannot be encoded.
    Permissive,
}

/// Derives the store key for an update.
pub type KeyFn = Arc<dyn Fn(&Context) -> Result<String, SessionError> + Send + Sync>;

/// Returns a key function producing `"{prefix}:{user_id}"`.
pub fn user_key(prefix: impl Into<String>) -> KeyFn {
    let prefix = prefix.into();
    Arc::new(move |ctx| {
        ctx.user()
            .map(|user| format!("{prefix}:{}", user.id))
            .ok_or_else(|| SessionError::key("update has no user"))
    })
}

/// Loads, exposes and persists a typed per-user session.
pub struct SessionManager<T> {
    store: BoxedStore,
    key_fn: KeyFn,
    ttl: Duration,
    policy: FailurePolicy,
    factory: Factory<T>,
}

impl<T: SessionData> SessionManager<T> {
    /// Starts building a manager whose fresh sessions come from `factory`.
    pub fn builder<F>(factory: F) -> SessionManagerBuilder<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        SessionManagerBuilder {
            factory: Arc::new(factory),
            store: None,
            key_fn: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            ttl: DEFAULT_TTL,
            policy: FailurePolicy::default(),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &BoxedStore {
        &self.store
    }

    /// Lifetime given to every write.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The failure policy.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Returns the middleware that loads the session before the chain and
    /// reconciles it afterwards.
    pub fn middleware(&self) -> Middleware {
        Middleware::layer(SessionLayer {
            manager: self.clone(),
        })
    }

    async fn load(&self, ctx: &Context, key: &str) -> Result<(T, bool), SessionError> {
        let raw = store_call(ctx, key, self.store.get(key)).await?;
        match raw {
            None => Ok(((self.factory)(), false)),
            Some(bytes) if bytes.is_empty() => Ok(((self.factory)(), true)),
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|source| SessionError::Decode {
                    key: key.to_string(),
                    source,
                })?;
                Ok((value, true))
            }
        }
    }

    async fn save(
        &self,
        ctx: &Context,
        key: &str,
        session: &Session<T>,
        stored: bool,
    ) -> Result<(), SessionError> {
        if session.is_empty() {
            if stored || session.is_modified() {
                store_call(ctx, key, self.store.delete(key)).await?;
                trace!(key, "session deleted");
            }
            return Ok(());
        }

        if !session.is_modified() {
            return Ok(());
        }

        let bytes = match session.encode() {
            Ok(bytes) => bytes,
            Err(source) => {
                let err = SessionError::Encode {
                    key: key.to_string(),
                    source,
                };
                return match self.policy {
                    FailurePolicy::Strict => Err(err),
                    FailurePolicy::Permissive => {
                        error!(error = %err, "session changes dropped");
                        Ok(())
                    }
                };
            }
        };

        store_call(ctx, key, self.store.set(key, bytes, self.ttl)).await?;
        trace!(key, ttl = ?self.ttl, "session saved");
        Ok(())
    }
}

impl<T> Clone for SessionManager<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key_fn: Arc::clone(&self.key_fn),
            ttl: self.ttl,
            policy: self.policy,
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T> fmt::Debug for SessionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("ttl", &self.ttl)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder<T> {
    factory: Factory<T>,
    store: Option<BoxedStore>,
    key_fn: Option<KeyFn>,
    key_prefix: String,
    ttl: Duration,
    policy: FailurePolicy,
}

impl<T: SessionData> SessionManagerBuilder<T> {
    /// Uses `store` instead of an in-memory store.
    pub fn store(mut self, store: BoxedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses a custom key function. Overrides [`key_prefix`](Self::key_prefix).
    pub fn key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&Context) -> Result<String, SessionError> + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    /// Sets the prefix of the default `"{prefix}:{user_id}"` key.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the lifetime given to every write.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the failure policy.
    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the manager.
    pub fn build(self) -> SessionManager<T> {
        SessionManager {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::with_sweep(DEFAULT_SWEEP_INTERVAL))),
            key_fn: self.key_fn.unwrap_or_else(|| user_key(self.key_prefix)),
            ttl: self.ttl,
            policy: self.policy,
            factory: self.factory,
        }
    }
}

/// Runs a store call, giving up as soon as the update is cancelled.
async fn store_call<R, F>(ctx: &Context, key: &str, call: F) -> Result<R, SessionError>
where
    F: Future<Output = StoreResult<R>>,
{
    tokio::select! {
        biased;
        () = ctx.cancellation_token().cancelled() => Err(SessionError::Cancelled),
        result = call => result.map_err(|source| SessionError::Store {
            key: key.to_string(),
            source,
        }),
    }
}

/// The [`Layer`] behind [`SessionManager::middleware`].
pub struct SessionLayer<T> {
    manager: SessionManager<T>,
}

impl<T> Clone for SessionLayer<T> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}

impl<T: SessionData> Layer<BoxedHandler> for SessionLayer<T> {
    type Service = SessionService<T>;

    fn layer(&self, inner: BoxedHandler) -> Self::Service {
        SessionService {
            manager: self.manager.clone(),
            inner,
        }
    }
}

/// The [`Service`] behind [`SessionManager::middleware`].
pub struct SessionService<T> {
    manager: SessionManager<T>,
    inner: BoxedHandler,
}

impl<T> Clone for SessionService<T> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<T: SessionData> Service<Arc<Context>> for SessionService<T> {
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<Context>) -> Self::Future {
        let manager = self.manager.clone();
        let inner = self.inner.clone();

        async move {
            let key = match (manager.key_fn)(&ctx) {
                Ok(key) => key,
                Err(err) if manager.policy == FailurePolicy::Permissive => {
                    warn!(
                        update_id = ctx.update().update_id,
                        error = %err,
                        "continuing without session"
                    );
                    return inner.oneshot(ctx).await;
                }
                Err(err) => return Err(err.into()),
            };

            let (value, stored) = manager.load(&ctx, &key).await?;
            let session = Session::new(value, Arc::clone(&manager.factory));
            ctx.insert_state(session.clone());

            inner.oneshot(Arc::clone(&ctx)).await?;

            manager.save(&ctx, &key, &session, stored).await?;
            Ok(())
        }
        .boxed()
    }
}
