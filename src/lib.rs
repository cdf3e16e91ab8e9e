//! classcache - normalized query cache and API client for classroom,
//! mentor, and session data.
//!
//! The crate sits between UI code and the academic REST backend. It
//! keeps fetched entities in normalized per-resource tables, executes
//! queries with request de-duplication and stale-while-revalidate
//! semantics, and uses tag-based invalidation to refetch exactly the
//! views a successful mutation made stale.
//!
//! ```no_run
//! use classcache::{ApiConfig, Store};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let store = Store::connect(&ApiConfig::new("http://localhost:8080"))?;
//!
//! let classrooms = store.classrooms().await;
//! for classroom in classrooms.data.unwrap_or_default() {
//!     println!("{}", classroom.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ApiResult, Backend};
pub use cache::{
    EntrySnapshot, QueryKey, QueryOp, QuerySnapshot, QueryStatus, Store, Subscription, Tag,
    TagScope,
};
pub use config::ApiConfig;
pub use models::{
    ClassRoom, Entity, Mentor, NewClassRoom, NewMentor, NewSession, ResourceKind, Session,
    SessionStatus,
};
