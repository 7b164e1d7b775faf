//! MemoryStore: an in-process [`DocumentStore`].
//!
//! Documents live in an insertion-ordered `Vec<Value>` behind a
//! `parking_lot::RwLock`. Every committed write emits one [`ChangeEvent`] on
//! the store's [`ChangeFeed`] *after* the lock is released, so invalidation
//! listeners can re-query synchronously.
//!
//! Allow/deny rules are recorded but never enforced: writes through this store
//! are trusted.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

use crate::config::StoreOptions;
use crate::error::{QueryError, StoreError, StoreResult};
use crate::query::execute::{select_page, shape_page};
use crate::query::{apply_modifier, matches};
use crate::query::selector::equality_fields;
use crate::stream::Unsubscribe;
use crate::types::{FindOptions, IdGeneration, UpdateOptions, UpsertResult};

use super::change_feed::{ChangeEvent, ChangeFeed};
use super::ids::generate_id;
use super::{AllowDenyRules, DocumentStore, LiveCursor};

/// State shared between the store and its cursors.
struct Shared {
    docs: RwLock<Vec<Value>>,
    feed: Arc<ChangeFeed>,
}

impl Shared {
    /// Projection and transform run after the read guard is released; a
    /// transform may query this store again.
    fn find(&self, selector: &Value, options: &FindOptions) -> StoreResult<Vec<Value>> {
        let page = select_page(self.docs.read().iter(), selector, options)?;
        Ok(shape_page(page, options)?)
    }
}

pub struct MemoryStore {
    name: Option<String>,
    id_generation: IdGeneration,
    extra: Map<String, Value>,
    shared: Arc<Shared>,
    allow_rules: Mutex<Vec<AllowDenyRules>>,
    deny_rules: Mutex<Vec<AllowDenyRules>>,
}

impl MemoryStore {
    pub fn new(name: Option<&str>, options: &StoreOptions) -> Self {
        Self {
            name: name.map(str::to_string),
            id_generation: options.id_generation,
            extra: options.extra.clone(),
            shared: Arc::new(Shared {
                docs: RwLock::new(Vec::new()),
                feed: Arc::new(ChangeFeed::new()),
            }),
            allow_rules: Mutex::new(Vec::new()),
            deny_rules: Mutex::new(Vec::new()),
        }
    }

    /// A named store with default options.
    pub fn named(name: &str) -> Self {
        Self::new(Some(name), &StoreOptions::default())
    }

    /// Insert `docs` immediately, returning their ids.
    pub fn seed(&self, docs: impl IntoIterator<Item = Value>) -> StoreResult<Vec<String>> {
        docs.into_iter().map(|d| self.insert_now(d)).collect()
    }

    pub fn len(&self) -> usize {
        self.shared.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Options this store was created with that it does not interpret itself.
    pub fn extra_options(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn id_generation(&self) -> IdGeneration {
        self.id_generation
    }

    pub fn change_feed(&self) -> &Arc<ChangeFeed> {
        &self.shared.feed
    }

    /// Number of registered (allow, deny) rule sets.
    pub fn rule_counts(&self) -> (usize, usize) {
        (self.allow_rules.lock().len(), self.deny_rules.lock().len())
    }

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| "<local>".to_string())
    }

    fn commit(&self, event: ChangeEvent) {
        tracing::trace!(collection = %self.label(), ?event, "write committed");
        self.shared.feed.emit(&event);
    }

    // -----------------------------------------------------------------------
    // Synchronous write paths
    // -----------------------------------------------------------------------

    fn insert_now(&self, doc: Value) -> StoreResult<String> {
        let Value::Object(mut obj) = doc else {
            return Err(StoreError::InvalidDocument("document must be an object".to_string()));
        };
        let id = match obj.get("_id") {
            None | Some(Value::Null) => generate_id(self.id_generation),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(StoreError::InvalidDocument(format!("_id must be a string, got {other}")))
            }
        };
        obj.insert("_id".to_string(), Value::String(id.clone()));

        {
            let mut docs = self.shared.docs.write();
            if docs.iter().any(|d| d["_id"] == id.as_str()) {
                return Err(StoreError::DuplicateId {
                    collection: self.label(),
                    id,
                });
            }
            docs.push(Value::Object(obj));
        }
        self.commit(ChangeEvent::Inserted { id: id.clone() });
        Ok(id)
    }

    fn remove_now(&self, selector: &Value) -> StoreResult<usize> {
        let removed: Vec<String> = {
            let mut docs = self.shared.docs.write();
            let mut hit = Vec::with_capacity(docs.len());
            for doc in docs.iter() {
                hit.push(matches(doc, selector)?);
            }
            let mut removed = Vec::new();
            let mut flags = hit.into_iter();
            docs.retain(|doc| {
                let drop = flags.next().unwrap_or(false);
                if drop {
                    removed.push(doc_id(doc));
                }
                !drop
            });
            removed
        };
        let count = removed.len();
        if count > 0 {
            self.commit(ChangeEvent::Removed { ids: removed });
        }
        Ok(count)
    }

    /// Modify matches in place. All replacements are computed before any is
    /// written, so a failing modifier leaves the store untouched.
    fn update_now(&self, selector: &Value, modifier: &Value, multi: bool) -> StoreResult<usize> {
        let updated: Vec<String> = {
            let mut docs = self.shared.docs.write();
            let mut replacements = Vec::new();
            for (idx, doc) in docs.iter().enumerate() {
                if !matches(doc, selector)? {
                    continue;
                }
                let next = apply_modifier(doc, modifier, false).map_err(|e| match e {
                    QueryError::ImmutableId => StoreError::ImmutableId {
                        collection: self.label(),
                        id: doc_id(doc),
                    },
                    other => other.into(),
                })?;
                replacements.push((idx, next));
                if !multi {
                    break;
                }
            }
            replacements
                .into_iter()
                .map(|(idx, next)| {
                    docs[idx] = next;
                    doc_id(&docs[idx])
                })
                .collect()
        };
        let count = updated.len();
        if count > 0 {
            self.commit(ChangeEvent::Updated { ids: updated });
        }
        Ok(count)
    }

    fn upsert_now(&self, selector: &Value, modifier: &Value, multi: bool) -> StoreResult<UpsertResult> {
        let count = self.update_now(selector, modifier, multi)?;
        if count > 0 {
            return Ok(UpsertResult {
                count,
                inserted_id: None,
            });
        }

        let mut base = equality_fields(selector);
        if !matches!(base.get("_id"), Some(Value::String(_))) {
            base.insert("_id".to_string(), Value::String(generate_id(self.id_generation)));
        }
        let doc = apply_modifier(&Value::Object(base), modifier, true)?;
        let id = self.insert_now(doc)?;
        Ok(UpsertResult {
            count: 1,
            inserted_id: Some(id),
        })
    }
}

fn doc_id(doc: &Value) -> String {
    doc.get("_id").and_then(Value::as_str).unwrap_or_default().to_string()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn insert_async(&self, doc: Value) -> StoreResult<String> {
        self.insert_now(doc)
    }

    async fn remove_async(&self, selector: Value) -> StoreResult<usize> {
        self.remove_now(&selector)
    }

    async fn update_async(
        &self,
        selector: Value,
        modifier: Value,
        options: UpdateOptions,
    ) -> StoreResult<usize> {
        if options.upsert {
            return self
                .upsert_now(&selector, &modifier, options.multi)
                .map(|r| r.count);
        }
        self.update_now(&selector, &modifier, options.multi)
    }

    async fn upsert_async(
        &self,
        selector: Value,
        modifier: Value,
        options: UpdateOptions,
    ) -> StoreResult<UpsertResult> {
        self.upsert_now(&selector, &modifier, options.multi)
    }

    async fn find_one_async(&self, selector: Value, options: FindOptions) -> StoreResult<Option<Value>> {
        self.find_one(&selector, &options)
    }

    fn find_one(&self, selector: &Value, options: &FindOptions) -> StoreResult<Option<Value>> {
        let options = FindOptions {
            limit: Some(1),
            ..options.clone()
        };
        Ok(self.shared.find(selector, &options)?.into_iter().next())
    }

    fn find(&self, selector: Value, options: FindOptions) -> Arc<dyn LiveCursor> {
        Arc::new(MemoryCursor {
            shared: Arc::clone(&self.shared),
            selector,
            options,
        })
    }

    fn allow(&self, rules: AllowDenyRules) -> bool {
        register(&self.allow_rules, rules, "allow")
    }

    fn deny(&self, rules: AllowDenyRules) -> bool {
        register(&self.deny_rules, rules, "deny")
    }
}

fn register(into: &Mutex<Vec<AllowDenyRules>>, rules: AllowDenyRules, kind: &'static str) -> bool {
    if !rules.has_predicates() {
        tracing::warn!(kind, "rules without insert/update/remove predicates ignored");
        return false;
    }
    into.lock().push(rules);
    true
}

// ============================================================================
// MemoryCursor
// ============================================================================

struct MemoryCursor {
    shared: Arc<Shared>,
    selector: Value,
    options: FindOptions,
}

impl LiveCursor for MemoryCursor {
    fn fetch(&self) -> StoreResult<Vec<Value>> {
        self.shared.find(&self.selector, &self.options)
    }

    /// Any write to the store invalidates the cursor.
    fn on_invalidate(&self, callback: Arc<dyn Fn() + Send + Sync>) -> Unsubscribe {
        self.shared.feed.subscribe(move |_| callback())
    }
}
