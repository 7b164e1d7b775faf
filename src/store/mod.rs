//! The host document store contract and its in-process implementation.
//!
//! # Modules
//!
//! - [`memory`]: [`MemoryStore`], a `DocumentStore` over an in-memory vector.
//! - [`change_feed`]: [`ChangeFeed`] / [`ChangeEvent`] write notifications.
//! - [`ids`]: `_id` generation for [`IdGeneration`](crate::types::IdGeneration).

pub mod change_feed;
pub mod ids;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;
use crate::stream::Unsubscribe;
use crate::types::{FindOptions, RawHandle, Transform, UpdateOptions, UpsertResult};

pub use change_feed::{ChangeEvent, ChangeFeed};
pub use memory::MemoryStore;

// ============================================================================
// DocumentStore: the host collection
// ============================================================================

/// A document collection owned by the host platform.
///
/// Selectors and modifiers arrive already normalized (a bare id string has
/// been expanded to `{"_id": id}`). The async mutations each resolve once;
/// retrying is up to the implementation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Collection name, `None` for an unnamed local collection.
    fn name(&self) -> Option<&str>;

    /// Insert `doc`, returning its `_id`.
    async fn insert_async(&self, doc: Value) -> StoreResult<String>;

    /// Remove every matching document, returning how many were removed.
    async fn remove_async(&self, selector: Value) -> StoreResult<usize>;

    /// Apply `modifier` to the first (or, with `multi`, every) match.
    async fn update_async(
        &self,
        selector: Value,
        modifier: Value,
        options: UpdateOptions,
    ) -> StoreResult<usize>;

    /// Update matches, or insert a document built from the selector and
    /// modifier when nothing matches.
    async fn upsert_async(
        &self,
        selector: Value,
        modifier: Value,
        options: UpdateOptions,
    ) -> StoreResult<UpsertResult>;

    async fn find_one_async(&self, selector: Value, options: FindOptions) -> StoreResult<Option<Value>>;

    fn find_one(&self, selector: &Value, options: &FindOptions) -> StoreResult<Option<Value>>;

    /// A live query handle. Nothing is read until the cursor is fetched.
    fn find(&self, selector: Value, options: FindOptions) -> Arc<dyn LiveCursor>;

    /// Register allow rules. Returns whether registration succeeded.
    fn allow(&self, rules: AllowDenyRules) -> bool;

    /// Register deny rules. Returns whether registration succeeded.
    fn deny(&self, rules: AllowDenyRules) -> bool;

    fn raw_collection(&self) -> Option<RawHandle> {
        None
    }

    fn raw_database(&self) -> Option<RawHandle> {
        None
    }
}

// ============================================================================
// LiveCursor
// ============================================================================

/// A live query over a store.
pub trait LiveCursor: Send + Sync {
    /// Current matching documents.
    fn fetch(&self) -> StoreResult<Vec<Value>>;

    fn count(&self) -> StoreResult<usize> {
        Ok(self.fetch()?.len())
    }

    /// Call `callback` whenever a previous `fetch` may be stale. The
    /// returned closure stops the notifications.
    fn on_invalidate(&self, callback: Arc<dyn Fn() + Send + Sync>) -> Unsubscribe;
}

// ============================================================================
// Allow / deny rules
// ============================================================================

/// `(user_id, doc)` predicate for inserts and removes.
pub type DocPredicate = Arc<dyn Fn(Option<&str>, &Value) -> bool + Send + Sync>;

/// `(user_id, doc, field_names, modifier)` predicate for updates.
pub type UpdatePredicate = Arc<dyn Fn(Option<&str>, &Value, &[String], &Value) -> bool + Send + Sync>;

/// Validation predicates registered with the host store. This crate never
/// evaluates them; they are handed to [`DocumentStore::allow`] /
/// [`DocumentStore::deny`] verbatim.
#[derive(Clone, Default)]
pub struct AllowDenyRules {
    pub insert: Option<DocPredicate>,
    pub update: Option<UpdatePredicate>,
    pub remove: Option<DocPredicate>,
    /// Fields the host should fetch before running the predicates.
    pub fetch: Option<Vec<String>>,
    pub transform: Option<Transform>,
}

impl AllowDenyRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, f: impl Fn(Option<&str>, &Value) -> bool + Send + Sync + 'static) -> Self {
        self.insert = Some(Arc::new(f));
        self
    }

    pub fn update(
        mut self,
        f: impl Fn(Option<&str>, &Value, &[String], &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.update = Some(Arc::new(f));
        self
    }

    pub fn remove(mut self, f: impl Fn(Option<&str>, &Value) -> bool + Send + Sync + 'static) -> Self {
        self.remove = Some(Arc::new(f));
        self
    }

    pub fn fetch(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fetch = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn transform(mut self, t: Transform) -> Self {
        self.transform = Some(t);
        self
    }

    /// Whether any of `insert`, `update` or `remove` is set.
    pub fn has_predicates(&self) -> bool {
        self.insert.is_some() || self.update.is_some() || self.remove.is_some()
    }
}

impl fmt::Debug for AllowDenyRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllowDenyRules")
            .field("insert", &self.insert.is_some())
            .field("update", &self.update.is_some())
            .field("remove", &self.remove.is_some())
            .field("fetch", &self.fetch)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}
