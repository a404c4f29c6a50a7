//! Per-user sessions with dirty tracking.
//!
//! A [`SessionManager`] loads a typed value from a [`SessionStore`] before the
//! chain runs, exposes it to handlers as a [`Session<T>`] handle and reconciles
//! it afterwards:
//!
//! | after a successful dispatch | store call |
//! |-----------------------------|------------|
//! | value is empty              | `delete` (skipped if nothing was ever stored) |
//! | value was modified          | `set` with a fresh TTL |
//! | otherwise                   | none |
//!
//! A failed dispatch writes nothing. Modification is tracked explicitly: every
//! mutating accessor on [`Session`] sets the flag, reads never do.
//!
//! Two concurrent updates of the same user race on their session; the last
//! write wins.

mod manager;
mod map;
mod memory;
mod store;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::error::ExtractResult;
use crate::extractor::FromContext;

pub use manager::{
    DEFAULT_KEY_PREFIX, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, FailurePolicy, KeyFn, SessionLayer,
    SessionManager, SessionManagerBuilder, SessionService, user_key,
};
pub use map::SessionMap;
pub use memory::MemoryStore;
pub use store::{BoxedStore, SessionStore};

/// A value that can live in a session.
pub trait SessionData: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns `true` when the value carries nothing worth storing.
    fn is_empty(&self) -> bool;
}

type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

struct SessionCell<T> {
    value: T,
    modified: bool,
}

/// Shared handle to the session value of the current update.
///
/// Every clone points at the same value. The lock is held only for the
/// duration of a closure, never across an `.await`.
pub struct Session<T> {
    cell: Arc<Mutex<SessionCell<T>>>,
    factory: Factory<T>,
}

impl<T: SessionData> Session<T> {
    pub(crate) fn new(value: T, factory: Factory<T>) -> Self {
        Self {
            cell: Arc::new(Mutex::new(SessionCell {
                value,
                modified: false,
            })),
            factory,
        }
    }

    /// Runs `f` on the value without marking it modified.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.lock().value)
    }

    /// Returns a copy of the value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.read(T::clone)
    }

    /// Runs `f` on the value and marks it modified.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut cell = self.cell.lock();
        cell.modified = true;
        f(&mut cell.value)
    }

    /// Replaces the value, returning the old one.
    pub fn replace(&self, value: T) -> T {
        self.update(|current| std::mem::replace(current, value))
    }

    /// Resets the value to a fresh default.
    pub fn clear(&self) {
        let fresh = (self.factory)();
        self.replace(fresh);
    }

    /// Returns `true` once a mutating accessor has been called.
    pub fn is_modified(&self) -> bool {
        self.cell.lock().modified
    }

    /// Returns `true` if the value is empty.
    pub fn is_empty(&self) -> bool {
        self.read(T::is_empty)
    }

    pub(crate) fn encode(&self) -> serde_json::Result<Vec<u8>> {
        self.read(serde_json::to_vec)
    }
}

impl<T> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.cell.lock();
        f.debug_struct("Session")
            .field("value", &cell.value)
            .field("modified", &cell.modified)
            .finish()
    }
}

impl<T: SessionData> FromContext for Session<T> {
    fn from_context(ctx: &Arc<Context>) -> ExtractResult<Self> {
        ctx.require_state::<Session<T>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        hits: u32,
    }

    impl SessionData for Counter {
        fn is_empty(&self) -> bool {
            self.hits == 0
        }
    }

    fn session(hits: u32) -> Session<Counter> {
        Session::new(Counter { hits }, Arc::new(Counter::default))
    }

    #[test]
    fn test_reads_do_not_mark_modified() {
        let s = session(3);
        assert_eq!(s.read(|c| c.hits), 3);
        assert_eq!(s.get(), Counter { hits: 3 });
        assert!(!s.is_empty());
        assert!(!s.is_modified());
    }

    #[test]
    fn test_mutations_mark_modified() {
        let s = session(0);
        s.update(|c| c.hits += 1);
        assert!(s.is_modified());

        let s = session(0);
        assert_eq!(s.replace(Counter { hits: 9 }).hits, 0);
        assert!(s.is_modified());
    }

    #[test]
    fn test_clear_resets_to_factory() {
        let s = session(5);
        s.clear();
        assert!(s.is_empty());
        assert!(s.is_modified());
    }

    #[test]
    fn test_clones_share_the_value() {
        let s = session(1);
        let other = s.clone();
        other.update(|c| c.hits = 2);
        assert_eq!(s.get().hits, 2);
        assert!(s.is_modified());
    }
}
