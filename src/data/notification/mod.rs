use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::registration::{Decision, Registration};

pub mod db;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Approval,
    Rejection,
}

impl From<Decision> for NotificationType {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => NotificationType::Approval,
            Decision::Reject => NotificationType::Rejection,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    /// Student username.
    pub student: String,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub registration: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub read: bool,
    pub created: bson::DateTime,
}

impl Notification {
    /// Notification describing `decision` on `registration`.
    ///
    /// The id only depends on the registration and the outcome, so the same
    /// outcome always maps onto the same notification.
    pub fn for_decision(
        registration: &Registration,
        decision: Decision,
        course_name: Option<&str>,
    ) -> Notification {
        let kind = NotificationType::from(decision);
        let course = course_name
            .map(|name| format!("\"{}\"", name))
            .unwrap_or_else(|| "the course".to_string());
        let message = match kind {
            NotificationType::Approval => {
                format!("Your registration for {} has been approved.", course)
            }
            NotificationType::Rejection => {
                format!("Your registration for {} has been rejected.", course)
            }
        };

        Notification {
            id: notification_id(registration.id, kind),
            student: registration.student.clone(),
            registration: registration.id,
            message,
            kind,
            read: false,
            created: bson::DateTime::now(),
        }
    }
}

pub fn notification_id(registration: Uuid, kind: NotificationType) -> Uuid {
    let tag = match kind {
        NotificationType::Approval => "approval",
        NotificationType::Rejection => "rejection",
    };
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}:{}", registration, tag).as_bytes(),
    )
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: Uuid,
    pub student_id: String,
    pub registration_id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub read: bool,
    pub created: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(value: Notification) -> Self {
        Self {
            id: value.id,
            student_id: value.student,
            registration_id: value.registration,
            message: value.message,
            kind: value.kind,
            read: value.read,
            created: value.created.to_chrono(),
        }
    }
}
