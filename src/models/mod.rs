//! Data models for the academic API entities.
//!
//! This module contains the data structures returned by the academic
//! backend:
//!
//! - `ClassRoom`: a bookable class with an optional assigned mentor
//! - `Mentor`: a mentor with contact info and a session fee
//! - `Session`: a booked session between a mentor and a student
//!
//! Entities reference each other by id only (a `Mentor` carries a
//! `class_room_id`, a `Session` carries mentor/student summaries); the
//! cache layer owns them in per-resource entity tables.

pub mod classroom;
pub mod mentor;
pub mod session;

pub use classroom::{ClassRoom, MentorSummary, NewClassRoom};
pub use mentor::{Mentor, NewMentor};
pub use session::{NewSession, Session, SessionMentor, SessionStatus, SessionStudent};

/// The three resource families served by the academic API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Classroom,
    Mentor,
    Session,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Classroom => write!(f, "classroom"),
            ResourceKind::Mentor => write!(f, "mentor"),
            ResourceKind::Session => write!(f, "session"),
        }
    }
}

/// An entity that can be stored in a normalized entity table.
///
/// `id()` is the field the backend uses as the primary key
/// (`class_room_id`, `mentor_id`, `session_id`); table keys must always
/// equal it.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn id(&self) -> i64;
}
