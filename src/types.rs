use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// OperationKind
// ============================================================================

/// Which mutation a pending operation is carrying out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Remove,
    Update,
    Upsert,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Insert => "insert",
            Self::Remove => "remove",
            Self::Update => "update",
            Self::Upsert => "upsert",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Selector
// ============================================================================

/// A Mongo-style selector. A bare string selects by `_id`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selector(Value);

impl Selector {
    /// The selector that matches every document.
    pub fn all() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Normalized selector object.
    pub fn into_value(self) -> Value {
        match self.0 {
            Value::String(id) => {
                let mut m = Map::new();
                m.insert("_id".to_string(), Value::String(id));
                Value::Object(m)
            }
            Value::Null => Value::Object(Map::new()),
            other => other,
        }
    }
}

impl From<Value> for Selector {
    fn from(v: Value) -> Self {
        Self(v)
    }
}

impl From<&str> for Selector {
    fn from(id: &str) -> Self {
        Self(Value::String(id.to_string()))
    }
}

impl From<String> for Selector {
    fn from(id: String) -> Self {
        Self(Value::String(id))
    }
}

// ============================================================================
// Update / upsert
// ============================================================================

/// Options for `update` and `upsert`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOptions {
    /// Modify every matching document instead of the first one.
    pub multi: bool,
    /// Insert a document when nothing matches.
    pub upsert: bool,
}

/// Outcome of an upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResult {
    /// Number of documents modified or inserted.
    pub count: usize,
    /// Set when the upsert inserted a new document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted_id: Option<String>,
}

// ============================================================================
// Find options
// ============================================================================

/// Sort direction for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A sort specification for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub field: String,
    pub direction: SortDirection,
}

impl SortEntry {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Per-document mapping applied after fetch.
#[derive(Clone)]
pub struct Transform(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl Transform {
    pub fn new(f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, doc: Value) -> Value {
        (self.0)(doc)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(..)")
    }
}

/// Options for `find` / `find_one`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<Vec<SortEntry>>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    /// Projection: `{field: 1}` includes, `{field: 0}` excludes. `_id` is
    /// kept unless explicitly excluded.
    pub fields: Option<Map<String, Value>>,
    /// Overrides the collection-level transform for this query.
    pub transform: Option<Transform>,
}

// ============================================================================
// Ids and raw handles
// ============================================================================

/// How a store generates `_id` for documents inserted without one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdGeneration {
    /// 17-character random string.
    #[default]
    #[serde(rename = "STRING", alias = "string")]
    String,
    /// 24 hex characters shaped like a Mongo ObjectId.
    #[serde(rename = "MONGO", alias = "objectId")]
    ObjectId,
}

/// Opaque driver handle returned by `raw_collection` / `raw_database`.
pub type RawHandle = Arc<dyn Any + Send + Sync>;
