use serde::{Deserialize, Serialize};

use super::{Entity, ResourceKind};

/// A classroom as returned by `GET /academic/classroom`.
///
/// The backend embeds a small mentor summary when a mentor has been
/// assigned; it stays a summary here, the full record lives in the
/// mentor table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRoom {
    pub class_room_id: i64,
    pub title: String,
    pub class_image: String,
    #[serde(default)]
    pub enrolled_student_count: i64,
    #[serde(default)]
    pub mentor: Option<MentorSummary>,
}

/// Embedded mentor name fields on a classroom row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorSummary {
    #[serde(default)]
    pub mentor_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
}

impl MentorSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Request body for creating a classroom (`POST /academic/classroom`).
#[derive(Debug, Clone, Serialize)]
pub struct NewClassRoom {
    pub title: String,
    pub class_image: String,
}

impl Entity for ClassRoom {
    const KIND: ResourceKind = ResourceKind::Classroom;

    fn id(&self) -> i64 {
        self.class_room_id
    }
}
