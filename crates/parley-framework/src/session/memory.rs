//! In-memory session store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::store::SessionStore;
use crate::error::StoreResult;

/// Fallback lifetime for TTLs too large to represent as an instant.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

type Entries = RwLock<HashMap<String, Entry>>;

/// A process-local [`SessionStore`] with TTL expiry.
///
/// Expired entries read as absent and are evicted by that read. With
/// [`with_sweep`](Self::with_sweep) a background task additionally evicts
/// all expired entries at a fixed interval. The task starts on the first
/// store operation made inside a tokio runtime and stops on
/// [`shutdown`](Self::shutdown) or when the store is dropped.
pub struct MemoryStore {
    entries: Arc<Entries>,
    sweep_interval: Option<Duration>,
    sweeper_started: AtomicBool,
    shutdown: CancellationToken,
}

impl MemoryStore {
    /// Creates a store without a background sweep.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a store that sweeps expired entries every `interval`.
    ///
    /// A zero interval disables the sweep.
    pub fn with_sweep(interval: Duration) -> Self {
        Self::build((!interval.is_zero()).then_some(interval))
    }

    fn build(sweep_interval: Option<Duration>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            sweep_interval,
            sweeper_started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Evicts every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries, Instant::now())
    }

    /// Stops the background sweep. Lazy eviction on reads keeps working.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn ensure_sweeper(&self) {
        let Some(interval) = self.sweep_interval else {
            return;
        };
        if self.sweeper_started.load(Ordering::Acquire) || self.shutdown.is_cancelled() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        if self.sweeper_started.swap(true, Ordering::AcqRel) {
            return;
        }

        handle.spawn(sweep(
            Arc::downgrade(&self.entries),
            interval,
            self.shutdown.clone(),
        ));
        debug!(?interval, "session sweep started");
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.len())
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_sweeper();
        let now = Instant::now();

        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Re-check under the write lock; a concurrent `set` may have refreshed it.
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                trace!(key, "evicted expired session");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        self.ensure_sweeper();
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE);
        self.entries
            .write()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.ensure_sweeper();
        self.entries.write().remove(key);
        Ok(())
    }
}

fn purge(entries: &Entries, now: Instant) -> usize {
    let mut entries = entries.write();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
}

async fn sweep(entries: Weak<Entries>, period: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                let removed = purge(&entries, Instant::now());
                if removed > 0 {
                    trace!(removed, "swept expired sessions");
                }
            }
        }
    }

    debug!("session sweep stopped");
}
