use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due: Option<bson::DateTime>,
    pub created: bson::DateTime,
}

/// A student's answer to an assignment. Only the latest one is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub assignment: Uuid,
    pub student: String,
    /// Answer text or a link to uploaded work.
    pub content: String,
    pub submitted_at: bson::DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub due: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
}

impl From<Assignment> for AssignmentResponse {
    fn from(value: Assignment) -> Self {
        Self {
            id: value.id,
            course_id: value.course,
            title: value.title,
            description: value.description,
            due: value.due.map(|it| it.to_chrono()),
            created: value.created.to_chrono(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: String,
    pub content: String,
    pub submitted_at: DateTime<Utc>,
    /// Whether the submission arrived after the assignment was due.
    pub late: bool,
}

impl SubmissionResponse {
    pub fn new(value: Submission, due: Option<bson::DateTime>) -> Self {
        Self {
            late: due.map(|due| value.submitted_at > due).unwrap_or(false),
            id: value.id,
            assignment_id: value.assignment,
            student_id: value.student,
            content: value.content,
            submitted_at: value.submitted_at.to_chrono(),
        }
    }
}
