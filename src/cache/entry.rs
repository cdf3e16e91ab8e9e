//! Per-query cache entry state.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::api::ApiError;

use super::endpoints::QueryOp;
use super::tags::Tag;

/// Lifecycle of a query cache entry.
///
/// `Uninitialized -> Loading -> {Success, Error}`; invalidation moves a
/// settled entry back to `Loading` (subscribed) or flags it stale
/// (unsubscribed). There is no terminal state - entries live until
/// evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Uninitialized,
    Loading,
    Success,
    Error,
}

/// Result of a landed query, as references into an entity table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum QueryData {
    /// Ordered ids from a list fetch.
    Ids(Vec<i64>),
    /// Single id from a by-id fetch.
    One(i64),
}

/// Cached state of one distinct fetch operation.
///
/// `data` survives re-entry into `Loading` so callers keep rendering the
/// previous result while a revalidation is in flight.
#[derive(Debug)]
pub(crate) struct QueryEntry {
    /// How to re-run this query, kept for invalidation-driven refetch.
    pub op: QueryOp,
    pub status: QueryStatus,
    pub data: Option<QueryData>,
    pub error: Option<ApiError>,
    pub subscribers: usize,
    /// Tags this entry currently provides; mirrored in the tag graph.
    pub provided: Vec<Tag>,
    /// Settled result has been invalidated with no subscriber watching;
    /// the refetch is deferred to the next query.
    pub stale: bool,
    /// Invalidation arrived while a fetch was in flight; re-check as
    /// soon as that fetch lands.
    pub pending_invalidation: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Present exactly while `status == Loading`; waiters subscribe and
    /// are woken when the in-flight fetch lands.
    pub in_flight: Option<watch::Sender<()>>,
}

impl QueryEntry {
    pub fn new(op: QueryOp) -> Self {
        Self {
            op,
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            subscribers: 0,
            provided: Vec::new(),
            stale: false,
            pending_invalidation: false,
            fetched_at: None,
            in_flight: None,
        }
    }

    /// A fresh success needs no fetch.
    pub fn is_fresh(&self) -> bool {
        self.status == QueryStatus::Success && !self.stale
    }

    /// Transition into `Loading`, keeping the previous result, and open
    /// the channel waiters attach to.
    pub fn begin_loading(&mut self) {
        let (tx, _rx) = watch::channel(());
        self.status = QueryStatus::Loading;
        self.in_flight = Some(tx);
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            status: self.status,
            stale: self.stale,
            subscribers: self.subscribers,
            error: self.error.clone(),
            fetched_at: self.fetched_at,
        }
    }
}

/// Observable state of a cache entry, for monitoring and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub status: QueryStatus,
    pub stale: bool,
    pub subscribers: usize,
    pub error: Option<ApiError>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl EntrySnapshot {
    /// Minutes since the last successful fetch landed.
    pub fn age_minutes(&self) -> Option<i64> {
        self.fetched_at.map(|at| (Utc::now() - at).num_minutes())
    }
}

/// What a query call hands back to the UI: status, materialized data
/// (the previous result while revalidating), and the error payload, all
/// as values - errors never cross this boundary as panics.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub stale: bool,
}

impl<T> QuerySnapshot<T> {
    pub(crate) fn uninitialized() -> Self {
        Self {
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            stale: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}
