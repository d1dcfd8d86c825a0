use std::collections::HashMap;

use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::course::db::problem as course_problem;
use crate::data::course::Course;
use crate::data::notification::Notification;
use crate::data::prelude::*;
use crate::data::user::db::problem as user_problem;
use crate::resp::problem::Problem;
use crate::role::Role;

use super::db::problem;
use super::{Decision, Registration, RegistrationResponse, RegistrationStatus};

/// Result of a teacher's decision on a registration.
#[derive(Debug, Clone)]
pub struct RespondOutcome {
    pub registration: Registration,
    /// Whether the student's notification was stored. Repeating the same
    /// decision retries it.
    pub notified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RespondResponse {
    pub registration: RegistrationResponse,
    pub notified: bool,
}

impl From<RespondOutcome> for RespondResponse {
    fn from(value: RespondOutcome) -> Self {
        RespondResponse {
            registration: RegistrationResponse::from(value.registration),
            notified: value.notified,
        }
    }
}

/// Creates a pending registration of `student` for `course`.
pub async fn request_course(
    db: &dyn Store,
    student: &str,
    course: Uuid,
) -> Result<Registration, Problem> {
    let user = db
        .find_user_by_username(student)
        .await?
        .ok_or_else(|| user_problem::not_found(student))?;
    if !user.role.can_enroll() {
        return Err(user_problem::wrong_role(student, Role::Student));
    }

    let course_name = match db.get_course(course).await? {
        Some(it) => it.name,
        None => return Err(course_problem::not_found(course)),
    };

    // A rejection whose notification failed is purged by the insert below.
    let leftovers = db
        .registrations_for_student(&user.username)
        .await?
        .into_iter()
        .filter(|it| it.course == course && it.status == RegistrationStatus::Rejected);
    for leftover in leftovers {
        let notification = Notification::for_decision(
            &leftover,
            Decision::Reject,
            Some(course_name.as_str()),
        );
        db.upsert_notification(&notification).await?;
        tracing::warn!(
            "Notified {} about rejected registration {} before replacing it",
            leftover.student,
            leftover.id
        );
    }

    let registration = Registration::new(&user.username, course);
    match db.insert_registration(&registration).await {
        Ok(()) => {
            tracing::info!(
                "{} requested registration {} for course {}",
                registration.student,
                registration.id,
                course
            );
            Ok(registration)
        }
        Err(StoreError::Duplicate) => Err(problem::already_registered(course)),
        Err(other) => Err(other.into()),
    }
}

/// Problem for a registration a conditional update didn't match.
async fn missing_or_conflict(db: &dyn Store, id: Uuid) -> Problem {
    match db.get_registration(id).await {
        Ok(Some(registration)) => problem::already_decided(id, registration.status),
        Ok(None) => problem::not_found(id),
        Err(e) => e.into(),
    }
}

async fn notify(
    db: &dyn Store,
    registration: &Registration,
    decision: Decision,
    course_name: Option<&str>,
) -> bool {
    let notification = Notification::for_decision(registration, decision, course_name);
    match db.upsert_notification(&notification).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                "Unable to notify {} about registration {}: {}",
                registration.student,
                registration.id,
                e
            );
            false
        }
    }
}

/// Applies a teacher's decision to a registration.
///
/// Approval moves a pending registration to registered and records the
/// course on the student. Rejection marks it rejected and deletes it once
/// the student has been notified. Both can be repeated safely: a repeated
/// decision finds the registration in its target state and re-emits the same
/// notification. Approving a rejected registration or rejecting a
/// registered one is a conflict.
pub async fn respond(
    db: &dyn Store,
    id: Uuid,
    decision: Decision,
) -> Result<RespondOutcome, Problem> {
    let registration = match db
        .transition_registration(id, decision.applies_to(), decision.target())
        .await?
    {
        Some(it) => it,
        None => return Err(missing_or_conflict(db, id).await),
    };

    let course_name = db.get_course(registration.course).await?.map(|it| it.name);

    if decision == Decision::Approve && course_name.is_some() {
        db.add_user_course(&registration.student, registration.course)
            .await?;
        // the course may have been deleted after it was read
        if db.get_course(registration.course).await?.is_none() {
            db.remove_course_from_users(registration.course).await?;
        }
    }

    let notified = notify(db, &registration, decision, course_name.as_deref()).await;

    if decision == Decision::Reject && notified {
        db.delete_registration(id, &[RegistrationStatus::Rejected])
            .await?;
    }

    tracing::info!(
        "Registration {} is now {} (notified: {})",
        registration.id,
        registration.status,
        notified
    );

    Ok(RespondOutcome {
        registration,
        notified,
    })
}

/// Withdraws a registration that hasn't been decided yet.
pub async fn cancel(db: &dyn Store, id: Uuid) -> Result<Registration, Problem> {
    match db
        .delete_registration(id, &[RegistrationStatus::Pending])
        .await?
    {
        Some(registration) => Ok(registration),
        None => Err(missing_or_conflict(db, id).await),
    }
}

fn course_names(courses: &[Course]) -> HashMap<Uuid, String> {
    courses
        .iter()
        .map(|it| (it.id, it.name.clone()))
        .collect()
}

/// Pending registrations for every course taught by `teacher`.
pub async fn list_pending(
    db: &dyn Store,
    teacher: &str,
) -> Result<Vec<RegistrationResponse>, Problem> {
    if db.find_user_by_username(teacher).await?.is_none() {
        return Err(user_problem::not_found(teacher));
    }

    let courses = db.courses_by_teacher(teacher).await?;
    let ids: Vec<Uuid> = courses.iter().map(|it| it.id).collect();
    let names = course_names(&courses);

    let pending = db
        .registrations_for_courses(&ids, RegistrationStatus::Pending)
        .await?;

    Ok(pending
        .into_iter()
        .map(|it| {
            let name = names.get(&it.course).cloned();
            RegistrationResponse::new(it, name)
        })
        .collect())
}

/// Courses `student` is registered in.
pub async fn list_approved_for_student(
    db: &dyn Store,
    student: &str,
) -> Result<Vec<Course>, Problem> {
    if db.find_user_by_username(student).await?.is_none() {
        return Err(user_problem::not_found(student));
    }

    let ids: Vec<Uuid> = db
        .registrations_for_student(student)
        .await?
        .into_iter()
        .filter(|it| it.status.is_registered())
        .map(|it| it.course)
        .collect();

    Ok(db.get_courses(&ids).await?)
}

/// All registrations of `student` that aren't rejected.
pub async fn list_for_student(
    db: &dyn Store,
    student: &str,
) -> Result<Vec<RegistrationResponse>, Problem> {
    if db.find_user_by_username(student).await?.is_none() {
        return Err(user_problem::not_found(student));
    }

    let registrations: Vec<Registration> = db
        .registrations_for_student(student)
        .await?
        .into_iter()
        .filter(|it| it.status.is_live())
        .collect();

    let ids: Vec<Uuid> = registrations.iter().map(|it| it.course).collect();
    let names = course_names(&db.get_courses(&ids).await?);

    Ok(registrations
        .into_iter()
        .map(|it| {
            let name = names.get(&it.course).cloned();
            RegistrationResponse::new(it, name)
        })
        .collect())
}
