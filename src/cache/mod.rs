//! Normalized query cache for academic API data.
//!
//! This module is the data-fetching and cache-consistency layer between
//! UI code and the backend:
//!
//! - `EntityTable`: normalized id -> entity storage, one per resource
//! - `QueryKey` / `QueryOp`: structural identity of a fetch operation
//! - `TagGraph`: index from dependency tags to the queries providing them
//! - `Store`: query execution with request de-duplication, tag-driven
//!   invalidation after mutations, and memoized selectors
//!
//! UI code reads through selectors and snapshots and acts through the
//! store's query and mutation methods; it never touches the tables
//! directly.

pub mod endpoints;
pub mod entity_table;
pub mod entry;
pub mod key;
pub mod store;
pub mod tags;

pub use endpoints::QueryOp;
pub use entity_table::EntityTable;
pub use entry::{EntrySnapshot, QuerySnapshot, QueryStatus};
pub use key::QueryKey;
pub use store::{Store, Subscription};
pub use tags::{Tag, TagScope};
