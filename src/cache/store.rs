//! The cache store: query execution, mutation execution, and the
//! invalidation engine.
//!
//! All bookkeeping happens under one mutex that is never held across an
//! await; the backend fetch is the only suspension point. That gives the
//! single-owner serialization the cache data structures require while
//! letting any number of tasks share the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiResult, Backend};
use crate::config::ApiConfig;
use crate::models::{ClassRoom, Entity, Mentor, ResourceKind, Session};

use super::endpoints::QueryOp;
use super::entity_table::EntityTable;
use super::entry::{EntrySnapshot, QueryData, QueryEntry, QueryStatus};
use super::key::QueryKey;
use super::tags::{Tag, TagGraph};

/// All mutable cache state, owned exclusively by the store.
pub(crate) struct CacheState {
    pub classrooms: EntityTable<ClassRoom>,
    pub mentors: EntityTable<Mentor>,
    pub sessions: EntityTable<Session>,
    pub entries: HashMap<QueryKey, QueryEntry>,
    pub tags: TagGraph,
}

impl CacheState {
    fn new() -> Self {
        Self {
            classrooms: EntityTable::new(),
            mentors: EntityTable::new(),
            sessions: EntityTable::new(),
            entries: HashMap::new(),
            tags: TagGraph::new(),
        }
    }
}

pub(crate) struct StoreInner<B> {
    pub backend: B,
    pub state: Mutex<CacheState>,
}

/// Shared handle to the cache store.
/// Clone is cheap - the state and backend live behind one Arc.
pub struct Store<B: Backend> {
    pub(crate) inner: Arc<StoreInner<B>>,
}

impl<B: Backend> Clone for Store<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A landed fetch result, before normalization into the entity tables.
pub(crate) enum Payload {
    Classrooms(Vec<ClassRoom>),
    Classroom(ClassRoom),
    Mentors(Vec<Mentor>),
    Mentor(Mentor),
    Sessions(Vec<Session>),
    Session(Session),
}

impl<B: Backend> Store<B> {
    pub fn new(backend: B) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                state: Mutex::new(CacheState::new()),
            }),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, CacheState> {
        // A poisoned lock only means a panic mid-bookkeeping elsewhere;
        // the state itself is still structurally sound
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register interest in a query. The entry is created if absent and
    /// its subscriber count incremented; dropping the guard decrements
    /// it. Entries with subscribers are eagerly refetched on
    /// invalidation, entries without are only marked stale.
    pub fn subscribe(&self, op: QueryOp) -> Subscription<B> {
        let key = op.key();
        {
            let mut st = self.state();
            let entry = st
                .entries
                .entry(key.clone())
                .or_insert_with(|| QueryEntry::new(op));
            entry.subscribers += 1;
        }
        Subscription {
            store: self.clone(),
            key,
        }
    }

    /// Execute a query: cache hit, attach to an in-flight fetch, or
    /// start a new fetch. On return the entry has settled (or re-settled
    /// after a coalesced invalidation); callers read it via snapshots.
    pub(crate) async fn run_query(&self, op: QueryOp) {
        let key = op.key();
        loop {
            enum Attach {
                Hit,
                Fetch,
                Wait(watch::Receiver<()>),
            }

            let attach = {
                let mut st = self.state();
                let entry = st
                    .entries
                    .entry(key.clone())
                    .or_insert_with(|| QueryEntry::new(op.clone()));
                if entry.status == QueryStatus::Loading {
                    match entry.in_flight.as_ref() {
                        Some(tx) => Attach::Wait(tx.subscribe()),
                        None => {
                            // Loading without a channel cannot happen;
                            // recover by taking the fetch ourselves
                            entry.begin_loading();
                            Attach::Fetch
                        }
                    }
                } else if entry.is_fresh() {
                    Attach::Hit
                } else {
                    entry.begin_loading();
                    Attach::Fetch
                }
            };

            match attach {
                Attach::Hit => {
                    debug!(key = %key, "Cache hit");
                    return;
                }
                Attach::Fetch => {
                    self.drive(op).await;
                    return;
                }
                Attach::Wait(mut rx) => {
                    debug!(key = %key, "Attached to in-flight fetch");
                    let _ = rx.changed().await;
                    let settled = {
                        let st = self.state();
                        match st.entries.get(&key) {
                            // Entry reset while we waited; report as-is
                            None => true,
                            Some(entry) => entry.status != QueryStatus::Loading && !entry.stale,
                        }
                    };
                    if settled {
                        return;
                    }
                }
            }
        }
    }

    /// Own the in-flight fetch for `op`: fetch, land, and refetch
    /// immediately if an invalidation was coalesced while in flight.
    async fn drive(&self, op: QueryOp) {
        loop {
            let result = self.fetch(&op).await;
            if !self.land(&op, result) {
                break;
            }
            debug!(key = %op.key(), "Re-fetching after mid-flight invalidation");
        }
    }

    async fn fetch(&self, op: &QueryOp) -> ApiResult<Payload> {
        let backend = &self.inner.backend;
        match op {
            QueryOp::ClassroomList => backend.list_classrooms().await.map(Payload::Classrooms),
            QueryOp::ClassroomById { classroom_id } => {
                backend.get_classroom(*classroom_id).await.map(Payload::Classroom)
            }
            QueryOp::MentorList { token } => {
                backend.list_mentors(token.as_deref()).await.map(Payload::Mentors)
            }
            QueryOp::MentorById { mentor_id, token } => backend
                .get_mentor(*mentor_id, token.as_deref())
                .await
                .map(Payload::Mentor),
            QueryOp::SessionList { token } => {
                backend.list_sessions(token.as_deref()).await.map(Payload::Sessions)
            }
            QueryOp::SessionById { session_id, token } => backend
                .get_session(*session_id, token.as_deref())
                .await
                .map(Payload::Session),
        }
    }

    /// Land a fetch result: normalize into the entity tables, record
    /// provided tags, settle the entry, wake waiters. Returns true when
    /// the entry must be fetched again (invalidated while in flight with
    /// a subscriber still watching).
    ///
    /// A failed fetch leaves the tables and the previous result
    /// untouched; only the entry's status and error change.
    fn land(&self, op: &QueryOp, result: ApiResult<Payload>) -> bool {
        let key = op.key();
        let mut st = self.state();
        let state = &mut *st;
        let Some(entry) = state.entries.get_mut(&key) else {
            debug!(key = %key, "Dropping fetch result for reset entry");
            return false;
        };

        match result {
            Ok(payload) => {
                let (data, provided) = match payload {
                    Payload::Classrooms(items) => {
                        let ids: Vec<i64> = items.iter().map(Entity::id).collect();
                        let mut provided = vec![Tag::list(ResourceKind::Classroom)];
                        provided.extend(ids.iter().map(|&id| Tag::id(ResourceKind::Classroom, id)));
                        state.classrooms.set_all(items);
                        (QueryData::Ids(ids), provided)
                    }
                    Payload::Classroom(item) => {
                        let id = item.id();
                        state.classrooms.upsert_one(item);
                        (QueryData::One(id), vec![Tag::id(ResourceKind::Classroom, id)])
                    }
                    Payload::Mentors(items) => {
                        let ids: Vec<i64> = items.iter().map(Entity::id).collect();
                        let mut provided = vec![Tag::list(ResourceKind::Mentor)];
                        provided.extend(ids.iter().map(|&id| Tag::id(ResourceKind::Mentor, id)));
                        state.mentors.set_all(items);
                        (QueryData::Ids(ids), provided)
                    }
                    Payload::Mentor(item) => {
                        let id = item.id();
                        state.mentors.upsert_one(item);
                        (QueryData::One(id), vec![Tag::id(ResourceKind::Mentor, id)])
                    }
                    Payload::Sessions(items) => {
                        let ids: Vec<i64> = items.iter().map(Entity::id).collect();
                        let mut provided = vec![Tag::list(ResourceKind::Session)];
                        provided.extend(ids.iter().map(|&id| Tag::id(ResourceKind::Session, id)));
                        state.sessions.set_all(items);
                        (QueryData::Ids(ids), provided)
                    }
                    Payload::Session(item) => {
                        let id = item.id();
                        state.sessions.upsert_one(item);
                        (QueryData::One(id), vec![Tag::id(ResourceKind::Session, id)])
                    }
                };

                state.tags.unlink(&key, &entry.provided);
                entry.provided = provided;
                state.tags.link(&key, &entry.provided);

                entry.status = QueryStatus::Success;
                entry.data = Some(data);
                entry.error = None;
                entry.stale = false;
                entry.fetched_at = Some(chrono::Utc::now());
                debug!(key = %key, "Query landed");
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Query failed");
                entry.status = QueryStatus::Error;
                entry.error = Some(err);
                entry.stale = false;
            }
        }

        let waiters = entry.in_flight.take();
        let refetch = if entry.pending_invalidation {
            entry.pending_invalidation = false;
            if entry.subscribers > 0 {
                entry.begin_loading();
                true
            } else {
                entry.stale = true;
                false
            }
        } else {
            false
        };
        if let Some(tx) = waiters {
            let _ = tx.send(());
        }
        refetch
    }

    /// Execute a mutation: on success resolve the declared tags and
    /// invalidate their providers; on failure every cache is left
    /// exactly as it was.
    pub(crate) async fn run_mutation<R, F, I>(&self, call: F, invalidates: I) -> ApiResult<R>
    where
        F: std::future::Future<Output = ApiResult<R>>,
        I: FnOnce(&R) -> Vec<Tag>,
    {
        match call.await {
            Ok(result) => {
                let tags = invalidates(&result);
                self.invalidate_tags(&tags);
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, "Mutation failed, caches untouched");
                Err(err)
            }
        }
    }

    /// Invalidate every entry providing any of `tags`.
    ///
    /// Subscribed settled entries go back to `Loading` (previous result
    /// retained) and are refetched on a spawned task; unsubscribed ones
    /// are marked stale; loading entries coalesce the invalidation into
    /// the in-flight fetch. Idempotent, and unknown tags are a no-op.
    pub fn invalidate_tags(&self, tags: &[Tag]) {
        let refetch: Vec<QueryOp> = {
            let mut st = self.state();
            let state = &mut *st;
            let keys = state.tags.resolve(tags);
            let mut refetch = Vec::new();
            for key in keys {
                let Some(entry) = state.entries.get_mut(&key) else {
                    continue;
                };
                match entry.status {
                    QueryStatus::Loading => {
                        entry.pending_invalidation = true;
                        debug!(key = %key, "Invalidation coalesced into in-flight fetch");
                    }
                    QueryStatus::Success | QueryStatus::Error => {
                        if entry.subscribers > 0 {
                            entry.begin_loading();
                            refetch.push(entry.op.clone());
                            debug!(key = %key, "Invalidated, refetching");
                        } else if !entry.stale {
                            entry.stale = true;
                            debug!(key = %key, "Invalidated, marked stale");
                        }
                    }
                    QueryStatus::Uninitialized => {}
                }
            }
            refetch
        };

        for op in refetch {
            let store = self.clone();
            tokio::spawn(async move {
                store.drive(op).await;
            });
        }
    }

    /// Hard reset: drop the entry and its tag edges entirely, previous
    /// result included. The next query starts from uninitialized. A
    /// result still in flight for the key is discarded when it lands.
    pub fn reset_query(&self, op: &QueryOp) {
        let key = op.key();
        let mut st = self.state();
        let state = &mut *st;
        if let Some(entry) = state.entries.remove(&key) {
            state.tags.unlink(&key, &entry.provided);
            debug!(key = %key, "Query reset");
        }
    }

    /// Drop every settled entry nobody subscribes to. Retention is
    /// otherwise unbounded; embedders call this on their own schedule.
    pub fn evict_idle(&self) -> usize {
        let mut st = self.state();
        let state = &mut *st;
        let idle: Vec<QueryKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.subscribers == 0 && entry.status != QueryStatus::Loading)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &idle {
            if let Some(entry) = state.entries.remove(key) {
                state.tags.unlink(key, &entry.provided);
            }
        }
        if !idle.is_empty() {
            debug!(count = idle.len(), "Evicted idle cache entries");
        }
        idle.len()
    }

    /// Observable state of one cache entry, if it exists.
    pub fn entry_snapshot(&self, key: &QueryKey) -> Option<EntrySnapshot> {
        self.state().entries.get(key).map(QueryEntry::snapshot)
    }

    // ===== Selectors =====
    //
    // Pure reads over the current tables. `select_all_*` hands out the
    // table's memoized snapshot, so while nothing changed callers get
    // the same Arc back (`Arc::ptr_eq`) and can skip re-rendering.

    pub fn select_all_classrooms(&self) -> Arc<[ClassRoom]> {
        self.state().classrooms.select_all()
    }

    pub fn select_classroom_by_id(&self, classroom_id: i64) -> Option<ClassRoom> {
        self.state().classrooms.select_by_id(classroom_id).cloned()
    }

    pub fn select_classroom_ids(&self) -> Vec<i64> {
        self.state().classrooms.ids().to_vec()
    }

    pub fn select_all_mentors(&self) -> Arc<[Mentor]> {
        self.state().mentors.select_all()
    }

    pub fn select_mentor_by_id(&self, mentor_id: i64) -> Option<Mentor> {
        self.state().mentors.select_by_id(mentor_id).cloned()
    }

    pub fn select_mentor_ids(&self) -> Vec<i64> {
        self.state().mentors.ids().to_vec()
    }

    pub fn select_all_sessions(&self) -> Arc<[Session]> {
        self.state().sessions.select_all()
    }

    pub fn select_session_by_id(&self, session_id: i64) -> Option<Session> {
        self.state().sessions.select_by_id(session_id).cloned()
    }

    pub fn select_session_ids(&self) -> Vec<i64> {
        self.state().sessions.ids().to_vec()
    }
}

impl Store<ApiClient> {
    /// Store backed by the real HTTP client.
    pub fn connect(config: &ApiConfig) -> ApiResult<Self> {
        Ok(Self::new(ApiClient::new(config)?))
    }
}

/// RAII subscriber registration; see `Store::subscribe`.
///
/// Dropping the last subscription does not cancel an in-flight fetch
/// and does not evict the entry - it only removes the entry from
/// eager-refetch consideration.
pub struct Subscription<B: Backend> {
    store: Store<B>,
    key: QueryKey,
}

impl<B: Backend> Subscription<B> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl<B: Backend> Drop for Subscription<B> {
    fn drop(&mut self) {
        let mut st = self.store.state();
        if let Some(entry) = st.entries.get_mut(&self.key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use tokio::sync::Semaphore;

    use crate::api::ApiError;
    use crate::models::{NewClassRoom, SessionMentor, SessionStatus, SessionStudent};

    #[derive(Default)]
    struct MockData {
        classrooms: Vec<ClassRoom>,
        /// Classrooms reachable by id but not present in the list payload.
        detail_classrooms: Vec<ClassRoom>,
        mentors: Vec<Mentor>,
        sessions: Vec<Session>,
        fail_queries: Option<ApiError>,
        fail_mutations: Option<ApiError>,
    }

    /// In-memory backend with call counters and an optional gate that
    /// holds query fetches until the test releases a permit.
    #[derive(Clone)]
    struct MockBackend {
        data: Arc<StdMutex<MockData>>,
        calls: Arc<StdMutex<HashMap<&'static str, usize>>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl MockBackend {
        fn new(data: MockData) -> Self {
            Self {
                data: Arc::new(StdMutex::new(data)),
                calls: Arc::new(StdMutex::new(HashMap::new())),
                gate: None,
            }
        }

        fn gated(data: MockData, gate: Arc<Semaphore>) -> Self {
            let mut backend = Self::new(data);
            backend.gate = Some(gate);
            backend
        }

        fn calls(&self, name: &'static str) -> usize {
            *self.calls.lock().unwrap().get(name).unwrap_or(&0)
        }

        fn record(&self, name: &'static str) {
            *self.calls.lock().unwrap().entry(name).or_insert(0) += 1;
        }

        async fn pass_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate closed").forget();
            }
        }

        fn query_failure(&self) -> Option<ApiError> {
            self.data.lock().unwrap().fail_queries.clone()
        }

        fn mutation_result<R>(&self, name: &'static str, ok: R) -> ApiResult<R> {
            self.record(name);
            match self.data.lock().unwrap().fail_mutations.clone() {
                Some(err) => Err(err),
                None => Ok(ok),
            }
        }
    }

    impl Backend for MockBackend {
        async fn list_classrooms(&self) -> ApiResult<Vec<ClassRoom>> {
            self.record("list_classrooms");
            self.pass_gate().await;
            if let Some(err) = self.query_failure() {
                return Err(err);
            }
            Ok(self.data.lock().unwrap().classrooms.clone())
        }

        async fn get_classroom(&self, classroom_id: i64) -> ApiResult<ClassRoom> {
            self.record("get_classroom");
            self.pass_gate().await;
            if let Some(err) = self.query_failure() {
                return Err(err);
            }
            let data = self.data.lock().unwrap();
            data.classrooms
                .iter()
                .chain(data.detail_classrooms.iter())
                .find(|c| c.class_room_id == classroom_id)
                .cloned()
                .ok_or_else(|| ApiError::Application {
                    message: "Classroom not found".to_string(),
                })
        }

        async fn list_mentors(&self, _token: Option<&str>) -> ApiResult<Vec<Mentor>> {
            self.record("list_mentors");
            self.pass_gate().await;
            if let Some(err) = self.query_failure() {
                return Err(err);
            }
            Ok(self.data.lock().unwrap().mentors.clone())
        }

        async fn get_mentor(&self, mentor_id: i64, _token: Option<&str>) -> ApiResult<Mentor> {
            self.record("get_mentor");
            self.pass_gate().await;
            if let Some(err) = self.query_failure() {
                return Err(err);
            }
            let data = self.data.lock().unwrap();
            data.mentors
                .iter()
                .find(|m| m.mentor_id == mentor_id)
                .cloned()
                .ok_or_else(|| ApiError::Application {
                    message: "Mentor not found".to_string(),
                })
        }

        async fn list_sessions(&self, _token: Option<&str>) -> ApiResult<Vec<Session>> {
            self.record("list_sessions");
            self.pass_gate().await;
            if let Some(err) = self.query_failure() {
                return Err(err);
            }
            Ok(self.data.lock().unwrap().sessions.clone())
        }

        async fn get_session(&self, session_id: i64, _token: Option<&str>) -> ApiResult<Session> {
            self.record("get_session");
            self.pass_gate().await;
            if let Some(err) = self.query_failure() {
                return Err(err);
            }
            let data = self.data.lock().unwrap();
            data.sessions
                .iter()
                .find(|s| s.session_id == session_id)
                .cloned()
                .ok_or_else(|| ApiError::Application {
                    message: "Session not found".to_string(),
                })
        }

        async fn create_classroom(
            &self,
            new: &NewClassRoom,
            _token: Option<&str>,
        ) -> ApiResult<ClassRoom> {
            let created = ClassRoom {
                class_room_id: 100,
                title: new.title.clone(),
                class_image: new.class_image.clone(),
                enrolled_student_count: 0,
                mentor: None,
            };
            self.mutation_result("create_classroom", created)
        }

        async fn update_classroom(
            &self,
            updated: &ClassRoom,
            _token: Option<&str>,
        ) -> ApiResult<ClassRoom> {
            self.mutation_result("update_classroom", updated.clone())
        }

        async fn delete_classroom(
            &self,
            _classroom_id: i64,
            _token: Option<&str>,
        ) -> ApiResult<()> {
            self.mutation_result("delete_classroom", ())
        }

        async fn create_mentor(
            &self,
            new: &crate::models::NewMentor,
            _token: Option<&str>,
        ) -> ApiResult<Mentor> {
            let created = Mentor {
                mentor_id: 100,
                first_name: new.first_name.clone(),
                last_name: new.last_name.clone(),
                email: new.email.clone(),
                title: new.title.clone(),
                session_fee: new.session_fee,
                phone_number: new.phone_number.clone(),
                class_room_id: new.class_room_id,
                mentor_image: new.mentor_image.clone(),
            };
            self.mutation_result("create_mentor", created)
        }

        async fn update_mentor(&self, updated: &Mentor, _token: Option<&str>) -> ApiResult<Mentor> {
            self.mutation_result("update_mentor", updated.clone())
        }

        async fn delete_mentor(&self, _mentor_id: i64, _token: Option<&str>) -> ApiResult<()> {
            self.mutation_result("delete_mentor", ())
        }

        async fn create_session(
            &self,
            new: &crate::models::NewSession,
            _token: Option<&str>,
        ) -> ApiResult<Session> {
            let created = Session {
                session_id: 100,
                topic: new.topic.clone(),
                start_time: new.start_time.clone(),
                session_status: SessionStatus::Pending,
                mentor: SessionMentor {
                    mentor_id: Some(new.mentor_id),
                    first_name: "Mock".to_string(),
                    last_name: "Mentor".to_string(),
                },
                student: SessionStudent {
                    student_id: None,
                    first_name: "Mock".to_string(),
                    last_name: "Student".to_string(),
                },
            };
            self.mutation_result("create_session", created)
        }

        async fn update_session(
            &self,
            updated: &Session,
            _status: SessionStatus,
            _token: Option<&str>,
        ) -> ApiResult<Session> {
            self.mutation_result("update_session", updated.clone())
        }

        async fn delete_session(&self, _session_id: i64, _token: Option<&str>) -> ApiResult<()> {
            self.mutation_result("delete_session", ())
        }
    }

    fn classroom(id: i64, title: &str) -> ClassRoom {
        ClassRoom {
            class_room_id: id,
            title: title.to_string(),
            class_image: format!("{}.png", title),
            enrolled_student_count: 0,
            mentor: None,
        }
    }

    fn mentor(id: i64, classroom_id: i64) -> Mentor {
        Mentor {
            mentor_id: id,
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
            title: "Mentor".to_string(),
            session_fee: 40.0,
            phone_number: "555-0100".to_string(),
            class_room_id: classroom_id,
            mentor_image: "grace.png".to_string(),
        }
    }

    /// Let spawned refetch tasks run on the current-thread test runtime.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_list_fetch_normalizes_and_selects() {
        let backend = MockBackend::new(MockData {
            classrooms: vec![classroom(1, "Math")],
            ..Default::default()
        });
        let store = Store::new(backend.clone());

        let snapshot = store.classrooms().await;
        assert!(snapshot.is_success());
        assert_eq!(snapshot.data.as_deref(), Some(&[classroom(1, "Math")][..]));

        let all = store.select_all_classrooms();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Math");

        // Normalization invariant: table keys equal the entities' own ids
        for id in store.select_classroom_ids() {
            assert_eq!(store.select_classroom_by_id(id).map(|c| c.class_room_id), Some(id));
        }
    }

    #[tokio::test]
    async fn test_fresh_entry_is_a_cache_hit() {
        let backend = MockBackend::new(MockData {
            classrooms: vec![classroom(1, "Math")],
            ..Default::default()
        });
        let store = Store::new(backend.clone());

        store.classrooms().await;
        let snapshot = store.classrooms().await;
        assert!(snapshot.is_success());
        assert_eq!(backend.calls("list_classrooms"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_queries_share_one_fetch() {
        let gate = Arc::new(Semaphore::new(0));
        let backend = MockBackend::gated(
            MockData {
                mentors: vec![mentor(5, 2)],
                ..Default::default()
            },
            Arc::clone(&gate),
        );
        let store = Store::new(backend.clone());

        // First caller starts the fetch and blocks on the gate; the
        // second attaches to the same in-flight entry before releasing.
        let (first, second) = tokio::join!(store.mentors(Some("tok")), async {
            gate.add_permits(1);
            store.mentors(Some("tok")).await
        });

        assert!(first.is_success());
        assert_eq!(first.data, second.data);
        assert_eq!(backend.calls("list_mentors"), 1);
    }

    #[tokio::test]
    async fn test_distinct_tokens_use_distinct_entries() {
        let backend = MockBackend::new(MockData {
            mentors: vec![mentor(5, 2)],
            ..Default::default()
        });
        let store = Store::new(backend.clone());

        store.mentors(Some("tok-a")).await;
        store.mentors(Some("tok-b")).await;
        assert_eq!(backend.calls("list_mentors"), 2);
    }

    #[tokio::test]
    async fn test_update_mentor_refetches_dependent_views() {
        let backend = MockBackend::new(MockData {
            // The classroom list knows only classroom 1; classroom 2 is
            // reachable by id, so the list does not provide its tag.
            classrooms: vec![classroom(1, "Math")],
            detail_classrooms: vec![classroom(2, "Physics")],
            mentors: vec![mentor(5, 2)],
            ..Default::default()
        });
        let store = Store::new(backend.clone());

        let _list_sub = store.subscribe(QueryOp::ClassroomList);
        let _detail_sub = store.subscribe(QueryOp::ClassroomById { classroom_id: 2 });
        let _mentors_sub = store.subscribe(QueryOp::MentorList { token: None });

        store.classrooms().await;
        store.classroom_by_id(2).await;
        store.mentors(None).await;
        assert_eq!(backend.calls("list_classrooms"), 1);
        assert_eq!(backend.calls("get_classroom"), 1);
        assert_eq!(backend.calls("list_mentors"), 1);

        store
            .update_mentor(mentor(5, 2), None)
            .await
            .expect("mutation succeeds");
        settle().await;

        // (Mentor, 5), (Mentor, LIST), (Classroom, 2): mentor list and
        // classroom 2 detail refetch, the classroom list is untouched
        assert_eq!(backend.calls("list_mentors"), 2);
        assert_eq!(backend.calls("get_classroom"), 2);
        assert_eq!(backend.calls("list_classrooms"), 1);

        let detail = store
            .entry_snapshot(&QueryOp::ClassroomById { classroom_id: 2 }.key())
            .expect("entry exists");
        assert_eq!(detail.status, QueryStatus::Success);
        assert!(!detail.stale);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_caches_untouched() {
        let backend = MockBackend::new(MockData {
            classrooms: vec![classroom(1, "Math")],
            mentors: vec![mentor(5, 2)],
            ..Default::default()
        });
        let store = Store::new(backend.clone());

        let _mentors_sub = store.subscribe(QueryOp::MentorList { token: None });
        store.classrooms().await;
        store.mentors(None).await;

        let classrooms_before = store.select_all_classrooms();
        let mentors_before = store.select_all_mentors();
        let entry_before = store
            .entry_snapshot(&QueryOp::MentorList { token: None }.key())
            .expect("entry exists");

        backend.data.lock().unwrap().fail_mutations =
            Some(ApiError::Network("connection refused".to_string()));
        let result = store.update_mentor(mentor(5, 2), None).await;
        assert!(result.is_err());
        settle().await;

        assert!(Arc::ptr_eq(&classrooms_before, &store.select_all_classrooms()));
        assert!(Arc::ptr_eq(&mentors_before, &store.select_all_mentors()));
        let entry_after = store
            .entry_snapshot(&QueryOp::MentorList { token: None }.key())
            .expect("entry exists");
        assert_eq!(entry_before, entry_after);
        assert_eq!(backend.calls("list_mentors"), 1);
    }

    #[tokio::test]
    async fn test_invalidation_without_subscribers_marks_stale() {
        let backend = MockBackend::new(MockData {
            classrooms: vec![classroom(1, "Math")],
            ..Default::default()
        });
        let store = Store::new(backend.clone());
        let key = QueryOp::ClassroomList.key();

        store.classrooms().await;
        store.invalidate_tags(&[Tag::list(ResourceKind::Classroom)]);

        let stale = store.entry_snapshot(&key).expect("entry exists");
        assert_eq!(stale.status, QueryStatus::Success);
        assert!(stale.stale);
        assert_eq!(backend.calls("list_classrooms"), 1);

        // Invalidating an already-stale entry changes nothing observable
        store.invalidate_tags(&[Tag::list(ResourceKind::Classroom)]);
        assert_eq!(store.entry_snapshot(&key).expect("entry exists"), stale);
        assert_eq!(backend.calls("list_classrooms"), 1);

        // The deferred refetch happens on the next query
        let snapshot = store.classrooms().await;
        assert!(snapshot.is_success());
        assert!(!snapshot.stale);
        assert_eq!(backend.calls("list_classrooms"), 2);
    }

    #[tokio::test]
    async fn test_invalidation_serves_previous_result_while_refetching() {
        let gate = Arc::new(Semaphore::new(1));
        let backend = MockBackend::gated(
            MockData {
                classrooms: vec![classroom(1, "Math")],
                ..Default::default()
            },
            Arc::clone(&gate),
        );
        let store = Store::new(backend.clone());
        let key = QueryOp::ClassroomList.key();

        let _sub = store.subscribe(QueryOp::ClassroomList);
        store.classrooms().await;
        backend.data.lock().unwrap().classrooms = vec![classroom(1, "Algebra")];

        // Refetch blocks on the gate; the previous result stays readable
        store.invalidate_tags(&[Tag::list(ResourceKind::Classroom)]);
        settle().await;
        assert_eq!(
            store.entry_snapshot(&key).expect("entry exists").status,
            QueryStatus::Loading
        );
        assert_eq!(store.select_all_classrooms()[0].title, "Math");

        gate.add_permits(1);
        settle().await;
        assert_eq!(
            store.entry_snapshot(&key).expect("entry exists").status,
            QueryStatus::Success
        );
        assert_eq!(store.select_all_classrooms()[0].title, "Algebra");
    }

    #[tokio::test]
    async fn test_error_is_delivered_and_retried_on_next_query() {
        let backend = MockBackend::new(MockData {
            fail_queries: Some(ApiError::Application {
                message: "boom".to_string(),
            }),
            ..Default::default()
        });
        let store = Store::new(backend.clone());

        let snapshot = store.classrooms().await;
        assert!(snapshot.is_error());
        assert_eq!(
            snapshot.error,
            Some(ApiError::Application {
                message: "boom".to_string()
            })
        );
        // The failed fetch corrupted nothing
        assert!(store.select_all_classrooms().is_empty());

        backend.data.lock().unwrap().fail_queries = None;
        backend.data.lock().unwrap().classrooms = vec![classroom(1, "Math")];
        let retried = store.classrooms().await;
        assert!(retried.is_success());
        assert_eq!(backend.calls("list_classrooms"), 2);
    }

    #[tokio::test]
    async fn test_invalidation_during_inflight_fetch_coalesces() {
        let gate = Arc::new(Semaphore::new(0));
        let backend = MockBackend::gated(
            MockData {
                classrooms: vec![classroom(1, "Math")],
                ..Default::default()
            },
            Arc::clone(&gate),
        );
        let store = Store::new(backend.clone());
        let key = QueryOp::ClassroomList.key();

        let _sub = store.subscribe(QueryOp::ClassroomList);
        let fetching = tokio::spawn({
            let store = store.clone();
            async move { store.classrooms().await }
        });
        settle().await;
        assert_eq!(
            store.entry_snapshot(&key).expect("entry exists").status,
            QueryStatus::Loading
        );
        assert_eq!(backend.calls("list_classrooms"), 1);

        // Invalidate while the fetch is in flight: no second concurrent
        // fetch, but a re-check as soon as the in-flight result lands
        store.invalidate_tags(&[Tag::list(ResourceKind::Classroom)]);
        assert_eq!(backend.calls("list_classrooms"), 1);

        gate.add_permits(2);
        let snapshot = fetching.await.expect("query task completes");
        assert!(snapshot.is_success());
        settle().await;
        assert_eq!(backend.calls("list_classrooms"), 2);
        let entry = store.entry_snapshot(&key).expect("entry exists");
        assert_eq!(entry.status, QueryStatus::Success);
        assert!(!entry.stale);
    }

    #[tokio::test]
    async fn test_unsubscribing_does_not_cancel_inflight_fetch() {
        let gate = Arc::new(Semaphore::new(0));
        let backend = MockBackend::gated(
            MockData {
                classrooms: vec![classroom(1, "Math")],
                ..Default::default()
            },
            Arc::clone(&gate),
        );
        let store = Store::new(backend.clone());
        let key = QueryOp::ClassroomList.key();

        let sub = store.subscribe(QueryOp::ClassroomList);
        let fetching = tokio::spawn({
            let store = store.clone();
            async move { store.classrooms().await }
        });
        settle().await;
        drop(sub);

        gate.add_permits(1);
        let snapshot = fetching.await.expect("query task completes");
        assert!(snapshot.is_success());
        assert_eq!(
            store.entry_snapshot(&key).expect("entry exists").status,
            QueryStatus::Success
        );
    }

    #[tokio::test]
    async fn test_evict_idle_drops_unsubscribed_entries() {
        let backend = MockBackend::new(MockData {
            classrooms: vec![classroom(1, "Math")],
            ..Default::default()
        });
        let store = Store::new(backend.clone());
        let key = QueryOp::ClassroomList.key();

        store.classrooms().await;
        let subscribed = store.subscribe(QueryOp::MentorList { token: None });

        assert_eq!(store.evict_idle(), 1);
        assert!(store.entry_snapshot(&key).is_none());
        assert!(store.entry_snapshot(subscribed.key()).is_some());

        // Next query starts cold
        store.classrooms().await;
        assert_eq!(backend.calls("list_classrooms"), 2);
    }

    #[tokio::test]
    async fn test_add_classroom_invalidates_list_only() {
        let backend = MockBackend::new(MockData {
            classrooms: vec![classroom(1, "Math")],
            mentors: vec![mentor(5, 2)],
            ..Default::default()
        });
        let store = Store::new(backend.clone());

        let _list_sub = store.subscribe(QueryOp::ClassroomList);
        let _mentors_sub = store.subscribe(QueryOp::MentorList { token: None });
        store.classrooms().await;
        store.mentors(None).await;

        store
            .add_classroom(
                NewClassRoom {
                    title: "Chemistry".to_string(),
                    class_image: "chem.png".to_string(),
                },
                None,
            )
            .await
            .expect("mutation succeeds");
        settle().await;

        assert_eq!(backend.calls("list_classrooms"), 2);
        assert_eq!(backend.calls("list_mentors"), 1);
    }

    #[tokio::test]
    async fn test_reset_discards_entry_and_previous_result() {
        let backend = MockBackend::new(MockData {
            classrooms: vec![classroom(1, "Math")],
            ..Default::default()
        });
        let store = Store::new(backend.clone());
        let op = QueryOp::ClassroomList;

        store.classrooms().await;
        store.reset_query(&op);
        assert!(store.entry_snapshot(&op.key()).is_none());

        let snapshot = store.classrooms().await;
        assert!(snapshot.is_success());
        assert_eq!(backend.calls("list_classrooms"), 2);
    }
}
