use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Username of the teacher owning the course.
    pub teacher: String,
    #[serde(default = "bson::DateTime::now")]
    pub created: bson::DateTime,
}

impl Course {
    pub fn new(name: impl ToString, description: impl ToString, teacher: impl ToString) -> Course {
        Course {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            teacher: teacher.to_string(),
            created: bson::DateTime::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub teacher: String,
    pub created: DateTime<Utc>,
}

impl From<Course> for CourseResponse {
    fn from(value: Course) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            teacher: value.teacher,
            created: value.created.to_chrono(),
        }
    }
}
