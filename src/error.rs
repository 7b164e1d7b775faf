use thiserror::Error;

use crate::types::OperationKind;

// ---------------------------------------------------------------------------
// QueryError
// ---------------------------------------------------------------------------

/// A selector or modifier the store cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    #[error("Invalid regex: {0}")]
    InvalidRegex(String),

    #[error("Invalid modifier: {0}")]
    InvalidModifier(String),

    #[error("Cannot change _id")]
    ImmutableId,
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Failure reported by the host document store.
///
/// `Clone` because a single failed mutation is fanned out to every subscriber
/// of its stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Duplicate id \"{id}\" in collection {collection}")]
    DuplicateId { collection: String, id: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Cannot modify immutable field \"_id\" of {collection}/{id}")]
    ImmutableId { collection: String, id: String },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Host store error: {0}")]
    Host(String),
}

// ---------------------------------------------------------------------------
// MutationError
// ---------------------------------------------------------------------------

/// The captured failure of one insert/remove/update/upsert.
///
/// Only ever observed through a subscriber's error callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} failed: {source}")]
pub struct MutationError {
    pub kind: OperationKind,
    #[source]
    pub source: StoreError,
}

impl MutationError {
    pub fn new(kind: OperationKind, source: StoreError) -> Self {
        Self { kind, source }
    }
}

// ---------------------------------------------------------------------------
// CollectionError: top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No tokio runtime available. Pass `runtime` in CollectionOptions or construct inside a runtime.")]
    NoRuntime,

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<QueryError> for CollectionError {
    fn from(e: QueryError) -> Self {
        Self::Store(StoreError::Query(e))
    }
}

impl From<serde_json::Error> for CollectionError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience alias: the default error type is `CollectionError`.
pub type Result<T, E = CollectionError> = std::result::Result<T, E>;

/// Result alias used by [`DocumentStore`](crate::store::DocumentStore) implementations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
