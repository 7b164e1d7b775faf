//! Live query cursors as streams.
//!
//! [`QueryCursorAdapter`] is the seam between a host [`LiveCursor`] and the
//! `Stream<Vec<T>>` that `Collection::find` returns. The default,
//! [`ReactiveCursorAdapter`], runs one computation per subscription:
//!
//! 1. On subscribe the computation registers an invalidation listener on the
//!    cursor and emits the current snapshot.
//! 2. Every invalidation re-fetches and emits again. Invalidations that arrive
//!    while a run is in progress (including from inside `next`) collapse into
//!    one more run after it, never a nested one.
//! 3. Unsubscribe stops the computation and removes its listener. Nothing is
//!    emitted once `unsubscribe()` returns. Dropping the `Subscription`
//!    without unsubscribing leaves the query running.
//! 4. A fetch or decode failure emits `error` and stops the computation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde::de::DeserializeOwned;

use crate::error::{CollectionError, Result};
use crate::store::LiveCursor;
use crate::stream::{Observer, Stream, Unsubscribe};

/// Turns a live cursor into a stream of result snapshots.
pub trait QueryCursorAdapter<T>: Send + Sync {
    fn create(&self, cursor: Arc<dyn LiveCursor>) -> Stream<Vec<T>>;
}

/// Re-fetches the cursor whenever it is invalidated.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactiveCursorAdapter;

impl<T> QueryCursorAdapter<T> for ReactiveCursorAdapter
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn create(&self, cursor: Arc<dyn LiveCursor>) -> Stream<Vec<T>> {
        Stream::new(move |observer| {
            let computation = Computation::start(Arc::clone(&cursor), observer);
            Box::new(move || computation.stop())
        })
    }
}

// ============================================================================
// Computation
// ============================================================================

struct Computation<T> {
    cursor: Arc<dyn LiveCursor>,
    observer: Observer<Vec<T>>,
    stopped: AtomicBool,
    running: AtomicBool,
    dirty: AtomicBool,
    listener: Mutex<Option<Unsubscribe>>,
    /// Held while a snapshot or error is delivered. Reentrant so `next` may
    /// unsubscribe.
    emitting: ReentrantMutex<()>,
}

impl<T> Computation<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn start(cursor: Arc<dyn LiveCursor>, observer: Observer<Vec<T>>) -> Arc<Self> {
        let computation = Arc::new(Self {
            cursor,
            observer,
            stopped: AtomicBool::new(false),
            running: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            listener: Mutex::new(None),
            emitting: ReentrantMutex::new(()),
        });

        // The listener keeps the computation alive until `stop` removes it.
        let this = Arc::clone(&computation);
        let unsubscribe = computation
            .cursor
            .on_invalidate(Arc::new(move || this.invalidate()));
        {
            let mut slot = computation.listener.lock();
            if computation.stopped.load(Ordering::SeqCst) {
                drop(slot);
                unsubscribe();
            } else {
                *slot = Some(unsubscribe);
            }
        }

        computation.invalidate();
        computation
    }

    fn invalidate(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        loop {
            if self.running.swap(true, Ordering::SeqCst) {
                return;
            }
            while self.dirty.swap(false, Ordering::SeqCst) {
                if self.stopped.load(Ordering::SeqCst) {
                    break;
                }
                self.run();
            }
            self.running.store(false, Ordering::SeqCst);
            // An invalidation may have landed between the last swap and the
            // store above; pick it up unless another thread already has.
            if !self.dirty.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    fn run(&self) {
        let result = self.snapshot();
        let _emitting = self.emitting.lock();
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        match result {
            Ok(docs) => self.observer.next(docs),
            Err(err) => {
                tracing::warn!(error = %err, "live query failed; stopping");
                self.stop();
                self.observer.error(err);
            }
        }
    }

    fn snapshot(&self) -> Result<Vec<T>> {
        self.cursor
            .fetch()?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(CollectionError::from))
            .collect()
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        // Wait out a delivery in progress on another thread.
        drop(self.emitting.lock());
        let listener = self.listener.lock().take();
        if let Some(unsubscribe) = listener {
            unsubscribe();
        }
        tracing::trace!("live query stopped");
    }
}
