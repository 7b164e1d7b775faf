//! SubscriberRegistry<T>: the per-call observer list behind a mutation stream.
//!
//! Three operations:
//!   - `append`: register an observer, returning its [`SubscriberId`].
//!   - `remove`: drop an observer by id. Idempotent, and a no-op once drained.
//!   - `drain_once`: hand every registered observer to the caller exactly once.
//!
//! After `drain_once` the registry is closed: `append` still returns an id but
//! the observer is discarded, and a second `drain_once` yields nothing.
//!
//! The lock is never held while observers run, so callbacks may subscribe or
//! unsubscribe re-entrantly.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::Observer;

/// Id returned by [`SubscriberRegistry::append`].
pub type SubscriberId = u64;

pub struct SubscriberRegistry<T> {
    /// `None` once drained.
    entries: Mutex<Option<Vec<(SubscriberId, Observer<T>)>>>,
    next_id: AtomicU64,
}

impl<T> SubscriberRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Some(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `observer` at the end of the list.
    pub fn append(&self, observer: Observer<T>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.entries.lock().as_mut() {
            Some(entries) => entries.push((id, observer)),
            None => tracing::trace!(subscriber = id, "registry already drained; observer dropped"),
        }
        id
    }

    /// Remove the observer registered under `id`. Returns whether it was present.
    pub fn remove(&self, id: SubscriberId) -> bool {
        match self.entries.lock().as_mut() {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|(sid, _)| *sid != id);
                entries.len() != before
            }
            None => false,
        }
    }

    /// Take every registered observer, in registration order, and close the
    /// registry. Subsequent calls return an empty list.
    pub fn drain_once(&self) -> Vec<Observer<T>> {
        self.entries
            .lock()
            .take()
            .map(|entries| entries.into_iter().map(|(_, obs)| obs).collect())
            .unwrap_or_default()
    }

    pub fn is_drained(&self) -> bool {
        self.entries.lock().is_none()
    }

    /// Number of observers waiting for delivery.
    pub fn len(&self) -> usize {
        self.entries.lock().as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
