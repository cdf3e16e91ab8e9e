//! Typed query and mutation endpoints over the store.
//!
//! Each query names the tags it provides and each mutation the tags it
//! invalidates, mirroring the backend's cross-entity relationships:
//! updating a mentor also invalidates the classroom that embeds the
//! mentor's name, updating a classroom also invalidates the session
//! list that displays it. The views never reference each other - the
//! dependency is declared here, once, per mutation.

use crate::api::{ApiResult, Backend};
use crate::models::{
    ClassRoom, Mentor, NewClassRoom, NewMentor, NewSession, ResourceKind, Session, SessionStatus,
};

use super::entry::{QueryData, QuerySnapshot};
use super::key::QueryKey;
use super::store::Store;
use super::tags::Tag;

/// One executable query, with everything needed to run it again later
/// (ids, and the opaque token for token-scoped endpoints).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryOp {
    ClassroomList,
    ClassroomById { classroom_id: i64 },
    MentorList { token: Option<String> },
    MentorById { mentor_id: i64, token: Option<String> },
    SessionList { token: Option<String> },
    SessionById { session_id: i64, token: Option<String> },
}

impl QueryOp {
    /// Structural cache key for this operation.
    pub fn key(&self) -> QueryKey {
        match self {
            QueryOp::ClassroomList => QueryKey::new(ResourceKind::Classroom, "list", vec![]),
            QueryOp::ClassroomById { classroom_id } => QueryKey::new(
                ResourceKind::Classroom,
                "byId",
                vec![classroom_id.to_string()],
            ),
            QueryOp::MentorList { token } => {
                QueryKey::new(ResourceKind::Mentor, "list", vec![token_param(token)])
            }
            QueryOp::MentorById { mentor_id, token } => QueryKey::new(
                ResourceKind::Mentor,
                "byId",
                vec![mentor_id.to_string(), token_param(token)],
            ),
            QueryOp::SessionList { token } => {
                QueryKey::new(ResourceKind::Session, "list", vec![token_param(token)])
            }
            QueryOp::SessionById { session_id, token } => QueryKey::new(
                ResourceKind::Session,
                "byId",
                vec![session_id.to_string(), token_param(token)],
            ),
        }
    }
}

fn token_param(token: &Option<String>) -> String {
    token.clone().unwrap_or_default()
}

fn owned(token: Option<&str>) -> Option<String> {
    token.map(str::to_string)
}

impl<B: Backend> Store<B> {
    // ===== Queries =====

    /// All classrooms. Provides `(Classroom, LIST)` plus one tag per row.
    pub async fn classrooms(&self) -> QuerySnapshot<Vec<ClassRoom>> {
        let op = QueryOp::ClassroomList;
        let key = op.key();
        self.run_query(op).await;
        self.classroom_list_snapshot(&key)
    }

    /// One classroom. Provides `(Classroom, id)`.
    pub async fn classroom_by_id(&self, classroom_id: i64) -> QuerySnapshot<ClassRoom> {
        let op = QueryOp::ClassroomById { classroom_id };
        let key = op.key();
        self.run_query(op).await;
        self.classroom_one_snapshot(&key)
    }

    /// All mentors, scoped to the caller's token.
    pub async fn mentors(&self, token: Option<&str>) -> QuerySnapshot<Vec<Mentor>> {
        let op = QueryOp::MentorList { token: owned(token) };
        let key = op.key();
        self.run_query(op).await;
        self.mentor_list_snapshot(&key)
    }

    pub async fn mentor_by_id(&self, mentor_id: i64, token: Option<&str>) -> QuerySnapshot<Mentor> {
        let op = QueryOp::MentorById {
            mentor_id,
            token: owned(token),
        };
        let key = op.key();
        self.run_query(op).await;
        self.mentor_one_snapshot(&key)
    }

    /// All sessions, scoped to the caller's token.
    pub async fn sessions(&self, token: Option<&str>) -> QuerySnapshot<Vec<Session>> {
        let op = QueryOp::SessionList { token: owned(token) };
        let key = op.key();
        self.run_query(op).await;
        self.session_list_snapshot(&key)
    }

    pub async fn session_by_id(
        &self,
        session_id: i64,
        token: Option<&str>,
    ) -> QuerySnapshot<Session> {
        let op = QueryOp::SessionById {
            session_id,
            token: owned(token),
        };
        let key = op.key();
        self.run_query(op).await;
        self.session_one_snapshot(&key)
    }

    // ===== Mutations =====
    //
    // Mutations never write the entity tables; consistency is re-derived
    // by the refetches their invalidations trigger.

    pub async fn add_classroom(
        &self,
        new: NewClassRoom,
        token: Option<&str>,
    ) -> ApiResult<ClassRoom> {
        self.run_mutation(self.backend().create_classroom(&new, token), |_| {
            vec![Tag::list(ResourceKind::Classroom)]
        })
        .await
    }

    /// Updating a classroom also touches the session list, which embeds
    /// classroom context.
    pub async fn update_classroom(
        &self,
        updated: ClassRoom,
        token: Option<&str>,
    ) -> ApiResult<ClassRoom> {
        let classroom_id = updated.class_room_id;
        self.run_mutation(self.backend().update_classroom(&updated, token), move |_| {
            vec![
                Tag::id(ResourceKind::Classroom, classroom_id),
                Tag::list(ResourceKind::Classroom),
                Tag::list(ResourceKind::Session),
            ]
        })
        .await
    }

    pub async fn delete_classroom(&self, classroom_id: i64, token: Option<&str>) -> ApiResult<()> {
        self.run_mutation(self.backend().delete_classroom(classroom_id, token), move |_| {
            vec![
                Tag::id(ResourceKind::Classroom, classroom_id),
                Tag::list(ResourceKind::Classroom),
            ]
        })
        .await
    }

    pub async fn add_mentor(&self, new: NewMentor, token: Option<&str>) -> ApiResult<Mentor> {
        self.run_mutation(self.backend().create_mentor(&new, token), |_| {
            vec![Tag::list(ResourceKind::Mentor)]
        })
        .await
    }

    /// Updating a mentor also invalidates the mentor's classroom, whose
    /// detail view embeds the mentor name.
    pub async fn update_mentor(&self, updated: Mentor, token: Option<&str>) -> ApiResult<Mentor> {
        let mentor_id = updated.mentor_id;
        let classroom_id = updated.class_room_id;
        self.run_mutation(self.backend().update_mentor(&updated, token), move |_| {
            vec![
                Tag::id(ResourceKind::Mentor, mentor_id),
                Tag::list(ResourceKind::Mentor),
                Tag::id(ResourceKind::Classroom, classroom_id),
            ]
        })
        .await
    }

    /// The classroom id comes from the caller because the delete
    /// response carries no body to read it from.
    pub async fn delete_mentor(
        &self,
        mentor_id: i64,
        classroom_id: i64,
        token: Option<&str>,
    ) -> ApiResult<()> {
        self.run_mutation(self.backend().delete_mentor(mentor_id, token), move |_| {
            vec![
                Tag::id(ResourceKind::Mentor, mentor_id),
                Tag::list(ResourceKind::Mentor),
                Tag::id(ResourceKind::Classroom, classroom_id),
            ]
        })
        .await
    }

    pub async fn add_session(&self, new: NewSession, token: Option<&str>) -> ApiResult<Session> {
        self.run_mutation(self.backend().create_session(&new, token), |_| {
            vec![Tag::list(ResourceKind::Session)]
        })
        .await
    }

    pub async fn update_session(
        &self,
        updated: Session,
        status: SessionStatus,
        token: Option<&str>,
    ) -> ApiResult<Session> {
        let session_id = updated.session_id;
        self.run_mutation(
            self.backend().update_session(&updated, status, token),
            move |_| {
                vec![
                    Tag::id(ResourceKind::Session, session_id),
                    Tag::list(ResourceKind::Session),
                ]
            },
        )
        .await
    }

    pub async fn delete_session(&self, session_id: i64, token: Option<&str>) -> ApiResult<()> {
        self.run_mutation(self.backend().delete_session(session_id, token), move |_| {
            vec![
                Tag::id(ResourceKind::Session, session_id),
                Tag::list(ResourceKind::Session),
            ]
        })
        .await
    }

    fn backend(&self) -> &B {
        &self.inner.backend
    }

    // ===== Snapshot builders =====
    //
    // Materialize a settled entry's ids against the current entity
    // table. During revalidation the previous ids are still present, so
    // callers keep data while the refetch is in flight.

    fn classroom_list_snapshot(&self, key: &QueryKey) -> QuerySnapshot<Vec<ClassRoom>> {
        let mut st = self.state();
        let state = &mut *st;
        let Some(entry) = state.entries.get(key) else {
            return QuerySnapshot::uninitialized();
        };
        let data = match &entry.data {
            Some(QueryData::Ids(ids)) => Some(
                ids.iter()
                    .filter_map(|&id| state.classrooms.select_by_id(id).cloned())
                    .collect(),
            ),
            _ => None,
        };
        QuerySnapshot {
            status: entry.status,
            data,
            error: entry.error.clone(),
            stale: entry.stale,
        }
    }

    fn classroom_one_snapshot(&self, key: &QueryKey) -> QuerySnapshot<ClassRoom> {
        let mut st = self.state();
        let state = &mut *st;
        let Some(entry) = state.entries.get(key) else {
            return QuerySnapshot::uninitialized();
        };
        let data = match &entry.data {
            Some(QueryData::One(id)) => state.classrooms.select_by_id(*id).cloned(),
            _ => None,
        };
        QuerySnapshot {
            status: entry.status,
            data,
            error: entry.error.clone(),
            stale: entry.stale,
        }
    }

    fn mentor_list_snapshot(&self, key: &QueryKey) -> QuerySnapshot<Vec<Mentor>> {
        let mut st = self.state();
        let state = &mut *st;
        let Some(entry) = state.entries.get(key) else {
            return QuerySnapshot::uninitialized();
        };
        let data = match &entry.data {
            Some(QueryData::Ids(ids)) => Some(
                ids.iter()
                    .filter_map(|&id| state.mentors.select_by_id(id).cloned())
                    .collect(),
            ),
            _ => None,
        };
        QuerySnapshot {
            status: entry.status,
            data,
            error: entry.error.clone(),
            stale: entry.stale,
        }
    }

    fn mentor_one_snapshot(&self, key: &QueryKey) -> QuerySnapshot<Mentor> {
        let mut st = self.state();
        let state = &mut *st;
        let Some(entry) = state.entries.get(key) else {
            return QuerySnapshot::uninitialized();
        };
        let data = match &entry.data {
            Some(QueryData::One(id)) => state.mentors.select_by_id(*id).cloned(),
            _ => None,
        };
        QuerySnapshot {
            status: entry.status,
            data,
            error: entry.error.clone(),
            stale: entry.stale,
        }
    }

    fn session_list_snapshot(&self, key: &QueryKey) -> QuerySnapshot<Vec<Session>> {
        let mut st = self.state();
        let state = &mut *st;
        let Some(entry) = state.entries.get(key) else {
            return QuerySnapshot::uninitialized();
        };
        let data = match &entry.data {
            Some(QueryData::Ids(ids)) => Some(
                ids.iter()
                    .filter_map(|&id| state.sessions.select_by_id(id).cloned())
                    .collect(),
            ),
            _ => None,
        };
        QuerySnapshot {
            status: entry.status,
            data,
            error: entry.error.clone(),
            stale: entry.stale,
        }
    }

    fn session_one_snapshot(&self, key: &QueryKey) -> QuerySnapshot<Session> {
        let mut st = self.state();
        let state = &mut *st;
        let Some(entry) = state.entries.get(key) else {
            return QuerySnapshot::uninitialized();
        };
        let data = match &entry.data {
            Some(QueryData::One(id)) => state.sessions.select_by_id(*id).cloned(),
            _ => None,
        };
        QuerySnapshot {
            status: entry.status,
            data,
            error: entry.error.clone(),
            stale: entry.stale,
        }
    }
}
