//! REST client module for the academic backend.
//!
//! This module provides the `ApiClient` for communicating with the
//! academic API (classrooms, mentors, sessions) and the `Backend` trait
//! that the cache layer fetches through.
//!
//! Authenticated endpoints take an opaque bearer token issued by an
//! external identity provider; the client forwards it without
//! interpreting it.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult};

use std::future::Future;

use crate::models::{
    ClassRoom, Mentor, NewClassRoom, NewMentor, NewSession, Session, SessionStatus,
};

/// The transport seam between the cache layer and the academic API.
///
/// One method per backend operation; the cache store is generic over an
/// implementation so tests can swap in an in-memory backend. Futures are
/// `Send` because invalidation-driven refetches run on spawned tasks.
pub trait Backend: Send + Sync + 'static {
    // ----- Queries -----

    fn list_classrooms(&self) -> impl Future<Output = ApiResult<Vec<ClassRoom>>> + Send;

    fn get_classroom(&self, classroom_id: i64) -> impl Future<Output = ApiResult<ClassRoom>> + Send;

    fn list_mentors(&self, token: Option<&str>)
        -> impl Future<Output = ApiResult<Vec<Mentor>>> + Send;

    fn get_mentor(
        &self,
        mentor_id: i64,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<Mentor>> + Send;

    fn list_sessions(
        &self,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<Vec<Session>>> + Send;

    fn get_session(
        &self,
        session_id: i64,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<Session>> + Send;

    // ----- Mutations -----

    fn create_classroom(
        &self,
        new: &NewClassRoom,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<ClassRoom>> + Send;

    fn update_classroom(
        &self,
        updated: &ClassRoom,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<ClassRoom>> + Send;

    fn delete_classroom(
        &self,
        classroom_id: i64,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    fn create_mentor(
        &self,
        new: &NewMentor,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<Mentor>> + Send;

    fn update_mentor(
        &self,
        updated: &Mentor,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<Mentor>> + Send;

    fn delete_mentor(
        &self,
        mentor_id: i64,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    fn create_session(
        &self,
        new: &NewSession,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<Session>> + Send;

    fn update_session(
        &self,
        updated: &Session,
        status: SessionStatus,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<Session>> + Send;

    fn delete_session(
        &self,
        session_id: i64,
        token: Option<&str>,
    ) -> impl Future<Output = ApiResult<()>> + Send;
}
