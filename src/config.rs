//! Collection configuration.
//!
//! [`CollectionOptions`] lists every option a [`Collection`](crate::Collection)
//! recognizes. Keys it does not recognize go in `extra` and reach the
//! [`Connection`] verbatim as part of [`StoreOptions`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::runtime::Handle;

use crate::error::Result;
use crate::store::{DocumentStore, MemoryStore};
use crate::types::{IdGeneration, Transform};

// ============================================================================
// StoreOptions
// ============================================================================

/// What a [`Connection`] receives when opening a store by name.
///
/// Deserializes from a flat object: `idGeneration` is recognized, every other
/// key lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOptions {
    #[serde(default)]
    pub id_generation: IdGeneration,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Connection
// ============================================================================

/// The session or server a named collection is opened against.
pub trait Connection: Send + Sync {
    fn open(&self, name: Option<&str>, options: &StoreOptions) -> Result<Arc<dyn DocumentStore>>;
}

/// Opens an in-process [`MemoryStore`] for every name. The default connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalConnection;

impl Connection for LocalConnection {
    fn open(&self, name: Option<&str>, options: &StoreOptions) -> Result<Arc<dyn DocumentStore>> {
        Ok(Arc::new(MemoryStore::new(name, options)))
    }
}

// ============================================================================
// CollectionOptions
// ============================================================================

/// Options for [`Collection::new`](crate::Collection::new).
///
/// | field | default | effect |
/// |---|---|---|
/// | `connection` | [`LocalConnection`] | opens the store when constructing by name |
/// | `id_generation` | [`IdGeneration::String`] | `_id` strategy for stores opened by name |
/// | `transform` | none | applied to each document returned by `find` / `find_one` |
/// | `runtime` | the current tokio runtime | where mutation futures are spawned |
/// | `extra` | empty | passed to the connection untouched |
///
/// `connection`, `id_generation` and `extra` are ignored when wrapping an
/// existing store.
#[derive(Clone, Default)]
pub struct CollectionOptions {
    pub connection: Option<Arc<dyn Connection>>,
    pub id_generation: IdGeneration,
    pub transform: Option<Transform>,
    pub runtime: Option<Handle>,
    pub extra: Map<String, Value>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn id_generation(mut self, strategy: IdGeneration) -> Self {
        self.id_generation = strategy;
        self
    }

    pub fn transform(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.transform = Some(Transform::new(f));
        self
    }

    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Add an option this crate does not interpret.
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub(crate) fn store_options(&self) -> StoreOptions {
        StoreOptions {
            id_generation: self.id_generation,
            extra: self.extra.clone(),
        }
    }
}

impl fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("connection", &self.connection.as_ref().map(|_| ".."))
            .field("id_generation", &self.id_generation)
            .field("transform", &self.transform)
            .field("runtime", &self.runtime.is_some())
            .field("extra", &self.extra)
            .finish()
    }
}
