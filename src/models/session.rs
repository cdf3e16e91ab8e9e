use serde::{Deserialize, Serialize};

use super::{Entity, ResourceKind};

/// Lifecycle of a booked session, as the backend reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Accepted,
    Completed,
    Cancelled,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "PENDING"),
            SessionStatus::Accepted => write!(f, "ACCEPTED"),
            SessionStatus::Completed => write!(f, "COMPLETED"),
            SessionStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A booked session as returned by `GET /academic/session`.
///
/// Mentor and student come embedded as name summaries; the start time is
/// passed through as the backend formats it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: i64,
    pub topic: String,
    pub start_time: String,
    pub session_status: SessionStatus,
    pub mentor: SessionMentor,
    pub student: SessionStudent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMentor {
    #[serde(default)]
    pub mentor_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStudent {
    #[serde(default)]
    pub student_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
}

/// Request body for booking a session (`POST /academic/session`).
#[derive(Debug, Clone, Serialize)]
pub struct NewSession {
    pub topic: String,
    pub start_time: String,
    pub mentor_id: i64,
}

impl Entity for Session {
    const KIND: ResourceKind = ResourceKind::Session;

    fn id(&self) -> i64 {
        self.session_id
    }
}
