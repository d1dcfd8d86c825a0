use std::str::FromStr;

use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;
pub mod workflow;

/// Lifecycle of a registration.
///
/// New requests are `Pending`. An approval moves them to `Registered`, a
/// rejection to `Rejected`, after which the record is deleted once the
/// student has been notified. `Approved` is never written; older records
/// carrying it are treated as registered.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
    Registered,
}

impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
            RegistrationStatus::Registered => "registered",
        }
    }

    pub fn is_registered(self) -> bool {
        matches!(
            self,
            RegistrationStatus::Approved | RegistrationStatus::Registered
        )
    }

    /// Whether the registration still counts towards the one per
    /// (student, course) limit.
    pub fn is_live(self) -> bool {
        self != RegistrationStatus::Rejected
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A teacher's answer to a pending registration.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Statuses a registration may be in for this decision to apply. The
    /// target status is included so repeated decisions are accepted.
    pub fn applies_to(self) -> &'static [RegistrationStatus] {
        match self {
            Decision::Approve => &[
                RegistrationStatus::Pending,
                RegistrationStatus::Approved,
                RegistrationStatus::Registered,
            ],
            Decision::Reject => &[RegistrationStatus::Pending, RegistrationStatus::Rejected],
        }
    }

    pub fn target(self) -> RegistrationStatus {
        match self {
            Decision::Approve => RegistrationStatus::Registered,
            Decision::Reject => RegistrationStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" | "approve" | "registered" => Ok(Decision::Approve),
            "rejected" | "reject" => Ok(Decision::Reject),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    /// Student username.
    pub student: String,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course: Uuid,
    pub status: RegistrationStatus,
    pub requested_at: bson::DateTime,
    #[serde(default)]
    pub responded_at: Option<bson::DateTime>,
}

impl Registration {
    pub fn new(student: impl ToString, course: Uuid) -> Registration {
        Registration {
            id: Uuid::new_v4(),
            student: student.to_string(),
            course,
            status: RegistrationStatus::Pending,
            requested_at: bson::DateTime::now(),
            responded_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: Uuid,
    pub student_id: String,
    pub course_id: Uuid,
    pub course_name: Option<String>,
    pub status: RegistrationStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl RegistrationResponse {
    pub fn new(value: Registration, course_name: Option<String>) -> Self {
        Self {
            id: value.id,
            student_id: value.student,
            course_id: value.course,
            course_name,
            status: value.status,
            requested_at: value.requested_at.to_chrono(),
            responded_at: value.responded_at.map(|it| it.to_chrono()),
        }
    }
}

impl From<Registration> for RegistrationResponse {
    fn from(value: Registration) -> Self {
        RegistrationResponse::new(value, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_status() -> impl Strategy<Value = RegistrationStatus> {
        prop_oneof![
            Just(RegistrationStatus::Pending),
            Just(RegistrationStatus::Approved),
            Just(RegistrationStatus::Rejected),
            Just(RegistrationStatus::Registered),
        ]
    }

    fn any_decision() -> impl Strategy<Value = Decision> {
        prop_oneof![Just(Decision::Approve), Just(Decision::Reject)]
    }

    proptest! {
        #[test]
        fn decisions_are_idempotent(decision in any_decision()) {
            prop_assert!(decision.applies_to().contains(&decision.target()));
        }

        #[test]
        fn approval_and_rejection_never_overwrite_each_other(status in any_status()) {
            let approvable = Decision::Approve.applies_to().contains(&status);
            let rejectable = Decision::Reject.applies_to().contains(&status);
            // only a pending registration can still go either way
            prop_assert_eq!(approvable && rejectable, status == RegistrationStatus::Pending);
        }

        #[test]
        fn decided_registrations_leave_pending(decision in any_decision()) {
            prop_assert_ne!(decision.target(), RegistrationStatus::Pending);
            prop_assert_eq!(decision.target().is_registered(), decision == Decision::Approve);
        }
    }

    #[test]
    fn decision_words() {
        assert_eq!("approved".parse::<Decision>(), Ok(Decision::Approve));
        assert_eq!(" Rejected ".parse::<Decision>(), Ok(Decision::Reject));
        assert_eq!("registered".parse::<Decision>(), Ok(Decision::Approve));
        assert_eq!("pending".parse::<Decision>(), Err(()));
    }

    #[test]
    fn legacy_approved_counts_as_registered() {
        assert!(RegistrationStatus::Approved.is_registered());
        assert!(RegistrationStatus::Registered.is_registered());
        assert!(!RegistrationStatus::Pending.is_registered());
        assert!(!RegistrationStatus::Rejected.is_live());
    }

    #[test]
    fn status_is_stored_lowercase() {
        let registration = Registration::new("s1", Uuid::new_v4());
        let document = bson::to_document(&registration).expect("serializable");
        assert_eq!(document.get_str("status").expect("status"), "pending");
    }
}
