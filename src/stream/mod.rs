//! Push-based streams: the surface every facade call returns.
//!
//! # Overview
//!
//! A [`Stream<T>`] is a cheap, clonable handle around a subscribe function.
//! Subscribing registers an [`Observer<T>`] and returns a [`Subscription`]
//! whose `unsubscribe()` tears that one registration down.
//!
//! There are two producers in this crate:
//!   - [`ResultBridge`]: one pending mutation multicast to all observers
//!     registered before it settles.
//!   - [`crate::cursor::ReactiveCursorAdapter`]: live query snapshots.
//!
//! # Modules
//!
//! - [`registry`]: [`SubscriberRegistry<T>`], the per-call observer list.
//! - [`result_bridge`]: [`ResultBridge<T>`] and [`PendingOperation<T>`].

pub mod registry;
pub mod result_bridge;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::CollectionError;

pub use registry::{SubscriberId, SubscriberRegistry};
pub use result_bridge::{PendingOperation, ResultBridge};

// ============================================================================
// Unsubscribe / Subscription
// ============================================================================

/// An owned one-shot closure that removes a subscription when called.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// Handle returned by [`Stream::subscribe`].
///
/// Dropping a `Subscription` does **not** unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe) explicitly.
pub struct Subscription {
    teardown: Mutex<Option<Unsubscribe>>,
}

impl Subscription {
    pub fn new(teardown: Unsubscribe) -> Self {
        Self {
            teardown: Mutex::new(Some(teardown)),
        }
    }

    /// Stop delivery to this subscription's observer.
    ///
    /// Safe to call any number of times; only the first call runs teardown.
    pub fn unsubscribe(&self) {
        let teardown = self.teardown.lock().take();
        if let Some(f) = teardown {
            f();
        }
    }

    /// Whether `unsubscribe()` has already run.
    pub fn is_closed(&self) -> bool {
        self.teardown.lock().is_none()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// Observer
// ============================================================================

pub type NextFn<T> = dyn Fn(T) + Send + Sync;
pub type ErrorFn = dyn Fn(CollectionError) + Send + Sync;
pub type CompleteFn = dyn Fn() + Send + Sync;

/// The callback triple registered by a subscriber. Every callback is optional.
///
/// ```ignore
/// stream.subscribe(
///     Observer::new()
///         .on_next(|id| println!("inserted {id}"))
///         .on_error(|e| eprintln!("{e}")),
/// );
/// ```
pub struct Observer<T> {
    next: Option<Arc<NextFn<T>>>,
    error: Option<Arc<ErrorFn>>,
    complete: Option<Arc<CompleteFn>>,
}

impl<T> Observer<T> {
    pub fn new() -> Self {
        Self {
            next: None,
            error: None,
            complete: None,
        }
    }

    pub fn on_next(mut self, f: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.next = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(CollectionError) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.complete = Some(Arc::new(f));
        self
    }

    // A panicking callback is logged and swallowed.

    pub fn next(&self, value: T) {
        if let Some(cb) = &self.next {
            guarded("next", || cb(value));
        }
    }

    pub fn error(&self, err: CollectionError) {
        if let Some(cb) = &self.error {
            guarded("error", || cb(err));
        }
    }

    pub fn complete(&self) {
        if let Some(cb) = &self.complete {
            guarded("complete", || cb());
        }
    }
}

fn guarded(callback: &'static str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(callback, "observer callback panicked; continuing delivery");
    }
}

impl<T> Default for Observer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            next: self.next.clone(),
            error: self.error.clone(),
            complete: self.complete.clone(),
        }
    }
}

// ============================================================================
// Stream
// ============================================================================

type SubscribeFn<T> = dyn Fn(Observer<T>) -> Unsubscribe + Send + Sync;

/// A push-based sequence of `T` with `next` / `error` / `complete` events.
///
/// What a subscriber sees depends on the producer. For mutation streams see
/// [`ResultBridge`]: observers must be registered before the mutation settles,
/// a later subscription is accepted but never called.
pub struct Stream<T> {
    source: Arc<SubscribeFn<T>>,
}

impl<T> Stream<T> {
    /// Build a stream from its subscribe function. `source` registers the
    /// observer and returns the teardown for that registration.
    pub fn new(source: impl Fn(Observer<T>) -> Unsubscribe + Send + Sync + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    pub fn subscribe(&self, observer: Observer<T>) -> Subscription {
        Subscription::new((self.source)(observer))
    }
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<T> std::fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Stream(..)")
    }
}
