use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{filter, StoreError, StoreResult};
use crate::resp::problem::Problem;

use super::{Assignment, Submission};

pub static ASSIGNMENT_COLLECTION_NAME: &str = "assignments";
pub static SUBMISSION_COLLECTION_NAME: &str = "assignment.submissions";

const MAX_CONTENT_LENGTH: usize = 100_000;

pub mod problem {
    use crate::resp::problem::{problems, Problem};
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        problems::not_found("Assignment", id)
    }

    #[inline]
    pub fn bad_assignment(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad assignment.").detail(detail)
    }

    #[inline]
    pub fn bad_submission(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad submission.").detail(detail)
    }

    #[inline]
    pub fn not_enrolled(student: impl ToString) -> Problem {
        problems::forbidden("Student isn't registered in the assignment's course.")
            .insert_str("studentId", student)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentCreateData {
    pub course_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due: Option<DateTime<Utc>>,
}

impl AssignmentCreateData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.title.trim().is_empty() {
            return Err(problem::bad_assignment("Assignment title can't be empty."));
        }
        if self.title.len() > 200 {
            return Err(problem::bad_assignment(
                "Assignment title can't be longer than 200 characters (bytes).",
            ));
        }
        Ok(())
    }

    pub fn into_assignment(self) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            course: self.course_id,
            title: self.title,
            description: self.description,
            due: self.due.map(bson::DateTime::from_chrono),
            created: bson::DateTime::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionData {
    /// Student username.
    pub student_id: String,
    pub content: String,
}

impl SubmissionData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.content.trim().is_empty() {
            return Err(problem::bad_submission("Submission can't be empty."));
        }
        if self.content.len() > MAX_CONTENT_LENGTH {
            return Err(problem::bad_submission("Submission is too long."));
        }
        Ok(())
    }
}

#[rocket::async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()>;

    async fn get_assignment(&self, id: Uuid) -> StoreResult<Option<Assignment>>;

    async fn assignments_for_course(&self, course: Uuid) -> StoreResult<Vec<Assignment>>;

    /// Stores the submission, replacing the content of an earlier one by the
    /// same student. Returns the stored submission.
    async fn upsert_submission(
        &self,
        assignment: Uuid,
        student: &str,
        content: &str,
    ) -> StoreResult<Submission>;

    async fn submissions_for(&self, assignment: Uuid) -> StoreResult<Vec<Submission>>;
}

async fn upsert_submission_once(
    db: &Database,
    assignment: Uuid,
    student: &str,
    content: &str,
) -> StoreResult<Option<Submission>> {
    Ok(db
        .collection::<Submission>(SUBMISSION_COLLECTION_NAME)
        .find_one_and_update(
            doc! { "assignment": filter::uuid(assignment), "student": student },
            doc! {
                "$set": { "content": content, "submitted_at": bson::DateTime::now() },
                "$setOnInsert": { "_id": filter::uuid(Uuid::new_v4()) },
            },
            FindOneAndUpdateOptions::builder()
                .upsert(true)
                .return_document(ReturnDocument::After)
                .build(),
        )
        .await?)
}

#[rocket::async_trait]
impl AssignmentStore for Database {
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        self.collection::<Assignment>(ASSIGNMENT_COLLECTION_NAME)
            .insert_one(assignment, None)
            .await?;
        Ok(())
    }

    async fn get_assignment(&self, id: Uuid) -> StoreResult<Option<Assignment>> {
        Ok(self
            .collection::<Assignment>(ASSIGNMENT_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?)
    }

    async fn assignments_for_course(&self, course: Uuid) -> StoreResult<Vec<Assignment>> {
        let cursor = self
            .collection::<Assignment>(ASSIGNMENT_COLLECTION_NAME)
            .find(
                filter::by_course(course),
                FindOptions::builder().sort(doc! { "created": 1 }).build(),
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn upsert_submission(
        &self,
        assignment: Uuid,
        student: &str,
        content: &str,
    ) -> StoreResult<Submission> {
        // two first submissions racing may both try to insert, the loser
        // finds the winner's document on retry
        let stored = match upsert_submission_once(self, assignment, student, content).await {
            Err(StoreError::Duplicate) => {
                upsert_submission_once(self, assignment, student, content).await?
            }
            other => other?,
        };

        stored.ok_or(StoreError::Inconsistent(
            "upsert returned no submission document",
        ))
    }

    async fn submissions_for(&self, assignment: Uuid) -> StoreResult<Vec<Submission>> {
        let cursor = self
            .collection::<Submission>(SUBMISSION_COLLECTION_NAME)
            .find(
                doc! { "assignment": filter::uuid(assignment) },
                FindOptions::builder()
                    .sort(doc! { "submitted_at": 1 })
                    .build(),
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_dates_are_kept() {
        let due = Utc::now();
        let data = AssignmentCreateData {
            course_id: Uuid::new_v4(),
            title: "Essay".to_string(),
            description: String::new(),
            due: Some(due),
        };
        assert!(data.validate().is_ok());

        let assignment = data.into_assignment();
        assert_eq!(
            assignment.due.map(|it| it.timestamp_millis()),
            Some(due.timestamp_millis())
        );
    }

    #[test]
    fn empty_submissions_are_rejected() {
        let data = SubmissionData {
            student_id: "s1".to_string(),
            content: "   ".to_string(),
        };
        assert!(data.validate().is_err());
    }
}
