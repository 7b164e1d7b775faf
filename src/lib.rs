//! Push-stream facade over a host document store.
//!
//! Every mutation on a [`Collection`] returns a [`Stream`] that delivers the
//! single outcome of the host's async call to all observers subscribed before
//! it settles; `find` returns a live stream of query snapshots.

pub mod error;
pub mod types;

pub mod collection;
pub mod config;
pub mod cursor;
pub mod query;
pub mod store;
pub mod stream;

pub use collection::{Collection, CollectionSource};
pub use config::{CollectionOptions, Connection, LocalConnection, StoreOptions};
pub use cursor::{QueryCursorAdapter, ReactiveCursorAdapter};
pub use error::{CollectionError, MutationError, QueryError, Result, StoreError};
pub use store::{AllowDenyRules, DocumentStore, LiveCursor, MemoryStore};
pub use stream::{Observer, Stream, Subscription, Unsubscribe};
pub use types::{
    FindOptions, IdGeneration, OperationKind, Selector, SortDirection, SortEntry, Transform,
    UpdateOptions, UpsertResult,
};
