//! Mongo-style selector, modifier and find execution used by [`crate::store::MemoryStore`].

pub mod execute;
pub mod modifier;
pub mod selector;

pub use execute::execute_find;
pub use modifier::{apply_modifier, modified_fields};
pub use selector::matches;
