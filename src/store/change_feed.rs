//! ChangeFeed: synchronous write notifications from a [`MemoryStore`].
//!
//! Every committed write emits one [`ChangeEvent`]. Live cursors listen here
//! and treat any event as an invalidation.
//!
//! Snapshot-on-emit semantics:
//!   - A listener removed *during* emission is still called in that round.
//!   - A listener added *during* emission is NOT called until the next emit.
//!
//! The lock is released before listeners run, so a listener may re-query the
//! store or (un)subscribe without deadlocking.
//!
//! [`MemoryStore`]: super::memory::MemoryStore

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::stream::Unsubscribe;

/// A committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Inserted { id: String },
    Updated { ids: Vec<String> },
    Removed { ids: Vec<String> },
}

impl ChangeEvent {
    /// Ids of the documents that were affected.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Self::Inserted { id } => vec![id.as_str()],
            Self::Updated { ids } | Self::Removed { ids } => ids.iter().map(String::as_str).collect(),
        }
    }
}

type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
pub struct ChangeFeed {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`; the returned closure removes it (idempotent).
    pub fn subscribe(self: &Arc<Self>, listener: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Unsubscribe {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        let feed = Arc::clone(self);
        Box::new(move || {
            feed.listeners.lock().retain(|(lid, _)| *lid != id);
        })
    }

    pub fn emit(&self, event: &ChangeEvent) {
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}
