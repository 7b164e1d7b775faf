//! Collection: the public facade over a host [`DocumentStore`].
//!
//! Mutations (`insert`, `remove`, `update`, `upsert`) return a [`Stream`]
//! immediately and never fail synchronously. Each call owns a fresh
//! [`ResultBridge`]; the host future is spawned on the collection's tokio
//! runtime and its single outcome is multicast to the observers subscribed
//! before it settles. Subscribe in the same turn as the call: a subscription
//! made after settlement is accepted but never called.
//!
//! Queries go through a [`QueryCursorAdapter`]; `find` yields a live stream
//! of snapshots, `find_one` / `find_one_async` pass straight through.
//!
//! ```ignore
//! let tasks: Collection = Collection::new("tasks", CollectionOptions::default())?;
//! tasks.insert(&json!({ "title": "write docs" }))
//!     .subscribe(Observer::new().on_next(|id| println!("inserted {id}")));
//! ```

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;

use crate::config::{CollectionOptions, Connection, LocalConnection};
use crate::cursor::{QueryCursorAdapter, ReactiveCursorAdapter};
use crate::error::{CollectionError, Result, StoreError};
use crate::store::{AllowDenyRules, DocumentStore};
use crate::stream::{ResultBridge, Stream};
use crate::types::{
    FindOptions, OperationKind, RawHandle, Selector, Transform, UpdateOptions, UpsertResult,
};

// ============================================================================
// CollectionSource
// ============================================================================

/// What a [`Collection`] wraps: a store to open by name (`None` for an
/// unnamed local collection) or a store that already exists.
#[derive(Clone)]
pub enum CollectionSource {
    Named(Option<String>),
    Existing(Arc<dyn DocumentStore>),
}

impl CollectionSource {
    pub fn existing<S: DocumentStore + 'static>(store: Arc<S>) -> Self {
        Self::Existing(store)
    }
}

impl From<&str> for CollectionSource {
    fn from(name: &str) -> Self {
        Self::Named(Some(name.to_string()))
    }
}

impl From<String> for CollectionSource {
    fn from(name: String) -> Self {
        Self::Named(Some(name))
    }
}

impl From<Option<&str>> for CollectionSource {
    fn from(name: Option<&str>) -> Self {
        Self::Named(name.map(str::to_string))
    }
}

impl From<Arc<dyn DocumentStore>> for CollectionSource {
    fn from(store: Arc<dyn DocumentStore>) -> Self {
        Self::Existing(store)
    }
}

impl fmt::Debug for CollectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Existing(store) => f.debug_tuple("Existing").field(&store.name()).finish(),
        }
    }
}

// ============================================================================
// Collection
// ============================================================================

/// A typed view of one host collection.
///
/// `T` is the document type; the default, [`Value`], works with any shape.
pub struct Collection<T = Value> {
    store: Arc<dyn DocumentStore>,
    runtime: Handle,
    transform: Option<Transform>,
    cursor_adapter: Arc<dyn QueryCursorAdapter<T>>,
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Open or wrap a store.
    ///
    /// Fails with [`CollectionError::NoRuntime`] when called outside a tokio
    /// runtime without `options.runtime`, or with whatever the connection
    /// reports when opening by name fails.
    pub fn new(source: impl Into<CollectionSource>, options: CollectionOptions) -> Result<Self> {
        let runtime = match &options.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| CollectionError::NoRuntime)?,
        };

        let store = match source.into() {
            CollectionSource::Existing(store) => {
                tracing::debug!(collection = ?store.name(), "wrapping existing store");
                store
            }
            CollectionSource::Named(name) => {
                let store_options = options.store_options();
                let store = match &options.connection {
                    Some(connection) => connection.open(name.as_deref(), &store_options)?,
                    None => LocalConnection.open(name.as_deref(), &store_options)?,
                };
                tracing::debug!(
                    collection = ?name,
                    id_generation = ?store_options.id_generation,
                    "opened store"
                );
                store
            }
        };

        Ok(Self {
            store,
            runtime,
            transform: options.transform,
            cursor_adapter: Arc::new(ReactiveCursorAdapter),
        })
    }

    /// Replace the adapter that turns `find` cursors into streams.
    pub fn with_cursor_adapter(mut self, adapter: impl QueryCursorAdapter<T> + 'static) -> Self {
        self.cursor_adapter = Arc::new(adapter);
        self
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Insert `doc`. Emits the new document's `_id`, then completes.
    pub fn insert(&self, doc: &T) -> Stream<String> {
        let doc = serde_json::to_value(doc);
        let store = Arc::clone(&self.store);
        ResultBridge::launch(OperationKind::Insert, &self.runtime, async move {
            let doc = doc.map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
            store.insert_async(doc).await
        })
    }

    /// Remove every matching document. Emits the number removed.
    pub fn remove(&self, selector: impl Into<Selector>) -> Stream<usize> {
        let selector = selector.into().into_value();
        let store = Arc::clone(&self.store);
        ResultBridge::launch(OperationKind::Remove, &self.runtime, async move {
            store.remove_async(selector).await
        })
    }

    /// Apply `modifier` to matching documents. Emits the number modified.
    pub fn update(
        &self,
        selector: impl Into<Selector>,
        modifier: Value,
        options: Option<UpdateOptions>,
    ) -> Stream<usize> {
        let selector = selector.into().into_value();
        let options = options.unwrap_or_default();
        let store = Arc::clone(&self.store);
        ResultBridge::launch(OperationKind::Update, &self.runtime, async move {
            store.update_async(selector, modifier, options).await
        })
    }

    /// Update matches or insert a new document when nothing matches.
    pub fn upsert(
        &self,
        selector: impl Into<Selector>,
        modifier: Value,
        options: Option<UpdateOptions>,
    ) -> Stream<UpsertResult> {
        let selector = selector.into().into_value();
        let options = options.unwrap_or_default();
        let store = Arc::clone(&self.store);
        ResultBridge::launch(OperationKind::Upsert, &self.runtime, async move {
            store.upsert_async(selector, modifier, options).await
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Live snapshots of the matching documents.
    pub fn find(&self, selector: Option<Selector>, options: Option<FindOptions>) -> Stream<Vec<T>> {
        let cursor = self
            .store
            .find(selector.unwrap_or_default().into_value(), self.find_options(options));
        self.cursor_adapter.create(cursor)
    }

    pub fn find_one(&self, selector: Option<Selector>, options: Option<FindOptions>) -> Result<Option<T>> {
        let selector = selector.unwrap_or_default().into_value();
        self.store
            .find_one(&selector, &self.find_options(options))?
            .map(decode)
            .transpose()
    }

    pub async fn find_one_async(
        &self,
        selector: Option<Selector>,
        options: Option<FindOptions>,
    ) -> Result<Option<T>> {
        let selector = selector.unwrap_or_default().into_value();
        self.store
            .find_one_async(selector, self.find_options(options))
            .await?
            .map(decode)
            .transpose()
    }

    /// The call's options, falling back to the collection transform.
    fn find_options(&self, options: Option<FindOptions>) -> FindOptions {
        let mut options = options.unwrap_or_default();
        if options.transform.is_none() {
            options.transform = self.transform.clone();
        }
        options
    }

    // -----------------------------------------------------------------------
    // Passthroughs
    // -----------------------------------------------------------------------

    pub fn allow(&self, rules: AllowDenyRules) -> bool {
        self.store.allow(rules)
    }

    pub fn deny(&self, rules: AllowDenyRules) -> bool {
        self.store.deny(rules)
    }

    pub fn raw_collection(&self) -> Option<RawHandle> {
        self.store.raw_collection()
    }

    pub fn raw_database(&self) -> Option<RawHandle> {
        self.store.raw_database()
    }
}

impl<T> Collection<T> {
    /// The wrapped store.
    pub fn collection(&self) -> &Arc<dyn DocumentStore> {
        self.wrapped()
    }

    /// Alias of [`collection`](Self::collection).
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        self.wrapped()
    }

    fn wrapped(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn name(&self) -> Option<&str> {
        self.store.name()
    }
}

fn decode<T: DeserializeOwned>(doc: Value) -> Result<T> {
    Ok(serde_json::from_value(doc)?)
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            runtime: self.runtime.clone(),
            transform: self.transform.clone(),
            cursor_adapter: Arc::clone(&self.cursor_adapter),
        }
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.store.name())
            .field("transform", &self.transform)
            .finish()
    }
}
