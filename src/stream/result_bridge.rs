//! ResultBridge<T>: one in-flight mutation exposed as a multicast [`Stream`].
//!
//! # Lifecycle
//!
//! 1. [`ResultBridge::new`] allocates a fresh [`SubscriberRegistry`] and an
//!    unsettled [`PendingOperation`].
//! 2. [`stream`](ResultBridge::stream) hands out a [`Stream`] whose subscribe
//!    appends to the registry; its teardown removes the observer by id.
//! 3. [`settle`](ResultBridge::settle) records the outcome, drains the
//!    registry and delivers to every observer present at that instant, in
//!    registration order: `next` + `complete` on success, `error` on failure.
//!
//! [`launch`](ResultBridge::launch) wires the three steps to a host future
//! spawned on a tokio runtime and returns the stream immediately.
//!
//! # Late subscribers
//!
//! Subscribing after settlement is accepted without error but the observer is
//! never called and its unsubscribe does nothing. Callers must subscribe
//! before yielding to the runtime. If nobody is subscribed at settlement, a
//! failure is logged at `debug` and otherwise dropped.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::error::{CollectionError, MutationError, StoreError};
use crate::types::OperationKind;

use super::{registry::SubscriberRegistry, Stream};

// ============================================================================
// PendingOperation
// ============================================================================

/// The in-flight record of one mutation and its eventual single outcome.
#[derive(Debug, Clone)]
pub struct PendingOperation<T> {
    pub kind: OperationKind,
    pub settled: bool,
    pub result: Option<T>,
    pub error: Option<MutationError>,
}

impl<T> PendingOperation<T> {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            settled: false,
            result: None,
            error: None,
        }
    }

    /// Record the outcome and return a copy for delivery. Returns `None`
    /// (leaving the record untouched) if it was already settled.
    fn settle(&mut self, outcome: Result<T, StoreError>) -> Option<Result<T, MutationError>>
    where
        T: Clone,
    {
        if self.settled {
            return None;
        }
        self.settled = true;
        match outcome {
            Ok(v) => {
                self.result = Some(v.clone());
                Some(Ok(v))
            }
            Err(e) => {
                let err = MutationError::new(self.kind, e);
                self.error = Some(err.clone());
                Some(Err(err))
            }
        }
    }
}

// ============================================================================
// ResultBridge
// ============================================================================

pub struct ResultBridge<T> {
    pending: Arc<Mutex<PendingOperation<T>>>,
    registry: Arc<SubscriberRegistry<T>>,
}

impl<T> Clone for ResultBridge<T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> ResultBridge<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(kind: OperationKind) -> Self {
        Self {
            pending: Arc::new(Mutex::new(PendingOperation::new(kind))),
            registry: Arc::new(SubscriberRegistry::new()),
        }
    }

    /// Spawn `operation` on `runtime` and return the stream of its outcome.
    ///
    /// Never blocks and never fails synchronously.
    pub fn launch<F>(kind: OperationKind, runtime: &Handle, operation: F) -> Stream<T>
    where
        F: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        let bridge = Self::new(kind);
        let stream = bridge.stream();
        tracing::debug!(kind = %kind, "launching mutation");
        runtime.spawn(async move {
            let outcome = operation.await;
            bridge.settle(outcome);
        });
        stream
    }

    /// A stream over this bridge's registry. Every call returns a handle to
    /// the same underlying operation.
    pub fn stream(&self) -> Stream<T> {
        let registry = Arc::clone(&self.registry);
        Stream::new(move |observer| {
            let id = registry.append(observer);
            let registry = Arc::clone(&registry);
            Box::new(move || {
                registry.remove(id);
            })
        })
    }

    /// Deliver the outcome. Returns `false` without delivering anything if
    /// the operation had already settled.
    pub fn settle(&self, outcome: Result<T, StoreError>) -> bool {
        let (kind, delivered) = {
            let mut pending = self.pending.lock();
            match pending.settle(outcome) {
                Some(delivered) => (pending.kind, delivered),
                None => {
                    tracing::warn!(kind = %pending.kind, "mutation settled twice; ignoring");
                    return false;
                }
            }
        };

        let observers = self.registry.drain_once();
        tracing::debug!(
            kind = %kind,
            ok = delivered.is_ok(),
            subscribers = observers.len(),
            "mutation settled"
        );

        match delivered {
            Ok(value) => {
                for obs in &observers {
                    obs.next(value.clone());
                    obs.complete();
                }
            }
            Err(err) => {
                if observers.is_empty() {
                    tracing::debug!(kind = %kind, error = %err, "mutation error dropped; no subscribers");
                }
                for obs in &observers {
                    obs.error(CollectionError::Mutation(err.clone()));
                }
            }
        }
        true
    }

    pub fn is_settled(&self) -> bool {
        self.pending.lock().settled
    }

    /// Snapshot of the pending-operation record.
    pub fn pending(&self) -> PendingOperation<T> {
        self.pending.lock().clone()
    }

    /// Observers that would receive the outcome if it settled now.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}
