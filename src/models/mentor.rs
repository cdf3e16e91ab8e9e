use serde::{Deserialize, Serialize};

use super::{Entity, ResourceKind};

/// A mentor as returned by `GET /academic/mentor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mentor {
    pub mentor_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub title: String,
    pub session_fee: f64,
    pub phone_number: String,
    pub class_room_id: i64,
    pub mentor_image: String,
}

impl Mentor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Entity for Mentor {
    const KIND: ResourceKind = ResourceKind::Mentor;

    fn id(&self) -> i64 {
        self.mentor_id
    }
}

/// Request body for creating a mentor (`POST /academic/mentor`).
///
/// The update endpoint (`PUT /academic/mentor`) takes the full `Mentor`
/// including its id.
#[derive(Debug, Clone, Serialize)]
pub struct NewMentor {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub title: String,
    pub session_fee: f64,
    pub phone_number: String,
    pub class_room_id: i64,
    pub mentor_image: String,
}
