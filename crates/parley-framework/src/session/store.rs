//! The pluggable session backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// A key/value backend for session payloads.
///
/// Implementations must be safe for concurrent use without caller locking.
/// An expired entry must read as absent.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Loads the payload stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// A shared, type-erased session store.
pub type BoxedStore = Arc<dyn SessionStore>;
