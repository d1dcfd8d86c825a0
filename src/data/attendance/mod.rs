use chrono::{DateTime, NaiveDate, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

/// Presence of one student in one course on one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course: Uuid,
    /// Stored as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub student: String,
    pub present: bool,
    pub marked_at: bson::DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub student_id: String,
    pub present: bool,
    pub marked_at: DateTime<Utc>,
}

impl From<AttendanceRecord> for AttendanceResponse {
    fn from(value: AttendanceRecord) -> Self {
        Self {
            id: value.id,
            course_id: value.course,
            date: value.date,
            student_id: value.student,
            present: value.present,
            marked_at: value.marked_at.to_chrono(),
        }
    }
}
