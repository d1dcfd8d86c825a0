use bson::{doc, Bson};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{filter, StoreResult};

use super::{Registration, RegistrationStatus};

pub static REGISTRATION_COLLECTION_NAME: &str = "registrations";

pub mod problem {
    use crate::data::registration::RegistrationStatus;
    use crate::resp::problem::{problems, Problem};
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn already_registered(course: Uuid) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Already registered for this course.")
            .insert_str("courseId", course)
    }

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        problems::not_found("Registration", id)
    }

    #[inline]
    pub fn bad_status(status: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Unknown registration status.")
            .insert_str("status", status)
            .detail("Expected 'approved' or 'rejected'.")
    }

    #[inline]
    pub fn already_decided(id: Uuid, status: RegistrationStatus) -> Problem {
        Problem::new_untyped(
            Status::Conflict,
            format!("Registration is already {}.", status),
        )
        .insert_str("id", id)
        .insert_str("status", status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequestData {
    /// Student username.
    pub student_id: String,
    pub course_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRespondData {
    pub registration_id: Uuid,
    /// `approved` or `rejected`.
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationApproveData {
    pub registration_id: Uuid,
}

fn statuses(statuses: &[RegistrationStatus]) -> Bson {
    Bson::Array(
        statuses
            .iter()
            .map(|it| Bson::String(it.as_str().to_string()))
            .collect(),
    )
}

#[rocket::async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Inserts a pending registration, dropping rejected leftovers for the
    /// same (student, course) pair first. Fails with
    /// [`StoreError::Duplicate`](crate::data::StoreError) if a live
    /// registration for the pair exists.
    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()>;

    async fn get_registration(&self, id: Uuid) -> StoreResult<Option<Registration>>;

    async fn registrations_for_student(&self, student: &str) -> StoreResult<Vec<Registration>>;

    async fn registrations_for_courses(
        &self,
        courses: &[Uuid],
        status: RegistrationStatus,
    ) -> StoreResult<Vec<Registration>>;

    async fn is_registered(&self, student: &str, course: Uuid) -> StoreResult<bool>;

    /// Moves the registration to `to` only if its status is one of `from`.
    /// Returns the updated registration, or `None` if nothing matched.
    async fn transition_registration(
        &self,
        id: Uuid,
        from: &[RegistrationStatus],
        to: RegistrationStatus,
    ) -> StoreResult<Option<Registration>>;

    /// Deletes the registration only if its status is one of `when`.
    async fn delete_registration(
        &self,
        id: Uuid,
        when: &[RegistrationStatus],
    ) -> StoreResult<Option<Registration>>;

    async fn delete_course_registrations(&self, course: Uuid) -> StoreResult<u64>;
}

#[rocket::async_trait]
impl RegistrationStore for Database {
    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()> {
        let collection = self.collection::<Registration>(REGISTRATION_COLLECTION_NAME);

        let mut leftovers = filter::by_student(registration.student.as_str());
        leftovers.insert("course", filter::uuid(registration.course));
        leftovers.insert("status", RegistrationStatus::Rejected.as_str());
        collection.delete_many(leftovers, None).await?;

        collection.insert_one(registration, None).await?;
        Ok(())
    }

    async fn get_registration(&self, id: Uuid) -> StoreResult<Option<Registration>> {
        Ok(self
            .collection::<Registration>(REGISTRATION_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?)
    }

    async fn registrations_for_student(&self, student: &str) -> StoreResult<Vec<Registration>> {
        let cursor = self
            .collection::<Registration>(REGISTRATION_COLLECTION_NAME)
            .find(
                filter::by_student(student),
                FindOptions::builder()
                    .sort(doc! { "requested_at": 1 })
                    .build(),
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn registrations_for_courses(
        &self,
        courses: &[Uuid],
        status: RegistrationStatus,
    ) -> StoreResult<Vec<Registration>> {
        if courses.is_empty() {
            return Ok(vec![]);
        }

        let cursor = self
            .collection::<Registration>(REGISTRATION_COLLECTION_NAME)
            .find(
                doc! {
                    "course": { "$in": filter::uuids(courses) },
                    "status": status.as_str(),
                },
                FindOptions::builder()
                    .sort(doc! { "requested_at": 1 })
                    .build(),
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn is_registered(&self, student: &str, course: Uuid) -> StoreResult<bool> {
        let mut query = filter::by_student(student);
        query.insert("course", filter::uuid(course));
        query.insert(
            "status",
            doc! { "$in": statuses(&[RegistrationStatus::Approved, RegistrationStatus::Registered]) },
        );

        Ok(self
            .collection::<Registration>(REGISTRATION_COLLECTION_NAME)
            .find_one(query, None)
            .await?
            .is_some())
    }

    async fn transition_registration(
        &self,
        id: Uuid,
        from: &[RegistrationStatus],
        to: RegistrationStatus,
    ) -> StoreResult<Option<Registration>> {
        let mut query = filter::by_id(id);
        query.insert("status", doc! { "$in": statuses(from) });

        Ok(self
            .collection::<Registration>(REGISTRATION_COLLECTION_NAME)
            .find_one_and_update(
                query,
                doc! { "$set": { "status": to.as_str(), "responded_at": bson::DateTime::now() } },
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?)
    }

    async fn delete_registration(
        &self,
        id: Uuid,
        when: &[RegistrationStatus],
    ) -> StoreResult<Option<Registration>> {
        let mut query = filter::by_id(id);
        query.insert("status", doc! { "$in": statuses(when) });

        Ok(self
            .collection::<Registration>(REGISTRATION_COLLECTION_NAME)
            .find_one_and_delete(query, None)
            .await?)
    }

    async fn delete_course_registrations(&self, course: Uuid) -> StoreResult<u64> {
        let result = self
            .collection::<Registration>(REGISTRATION_COLLECTION_NAME)
            .delete_many(filter::by_course(course), None)
            .await?;
        Ok(result.deleted_count)
    }
}
