use std::collections::HashSet;

use bson::{doc, Document};
use chrono::NaiveDate;
use mongodb::options::{FindOptions, UpdateOptions};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{filter, StoreError, StoreResult};
use crate::resp::problem::Problem;

use super::AttendanceRecord;

pub static ATTENDANCE_COLLECTION_NAME: &str = "attendance";

const MAX_ENTRIES: usize = 500;

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn bad_attendance(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad attendance list.").detail(detail)
    }

    #[inline]
    pub fn not_enrolled(students: &[String]) -> Problem {
        Problem::new_untyped(
            Status::BadRequest,
            "Some students aren't registered in the course.",
        )
        .insert("studentIds", students)
    }

    #[inline]
    pub fn bad_date(date: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad date.")
            .insert_str("date", date)
            .detail("Expected a date formatted as YYYY-MM-DD.")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    /// Student username.
    pub student_id: String,
    pub present: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMarkData {
    pub course_id: Uuid,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub records: Vec<AttendanceEntry>,
}

impl AttendanceMarkData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.records.is_empty() {
            return Err(problem::bad_attendance("No students listed."));
        }
        if self.records.len() > MAX_ENTRIES {
            return Err(problem::bad_attendance(format!(
                "At most {} students can be marked at once.",
                MAX_ENTRIES
            )));
        }

        let mut seen = HashSet::new();
        if let Some(twice) = self
            .records
            .iter()
            .find(|it| !seen.insert(it.student_id.as_str()))
        {
            return Err(problem::bad_attendance(format!(
                "Student '{}' is listed more than once.",
                twice.student_id
            )));
        }

        Ok(())
    }
}

pub fn parse_date(date: &str) -> Result<NaiveDate, Problem> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| problem::bad_date(date))
}

#[rocket::async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Marks every entry, replacing earlier marks for the same
    /// (course, date, student). Returns the stored records of the listed
    /// students.
    async fn upsert_attendance(
        &self,
        course: Uuid,
        date: NaiveDate,
        entries: &[AttendanceEntry],
    ) -> StoreResult<Vec<AttendanceRecord>>;

    async fn attendance_for_course(
        &self,
        course: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<AttendanceRecord>>;

    async fn attendance_for_student(&self, student: &str) -> StoreResult<Vec<AttendanceRecord>>;
}

fn record_order() -> Document {
    doc! { "date": 1, "student": 1 }
}

async fn mark_once(
    db: &Database,
    course: Uuid,
    date: NaiveDate,
    entry: &AttendanceEntry,
) -> StoreResult<()> {
    db.collection::<AttendanceRecord>(ATTENDANCE_COLLECTION_NAME)
        .update_one(
            doc! {
                "course": filter::uuid(course),
                "date": date.to_string(),
                "student": entry.student_id.as_str(),
            },
            doc! {
                "$set": { "present": entry.present, "marked_at": bson::DateTime::now() },
                "$setOnInsert": { "_id": filter::uuid(Uuid::new_v4()) },
            },
            UpdateOptions::builder().upsert(true).build(),
        )
        .await?;
    Ok(())
}

#[rocket::async_trait]
impl AttendanceStore for Database {
    async fn upsert_attendance(
        &self,
        course: Uuid,
        date: NaiveDate,
        entries: &[AttendanceEntry],
    ) -> StoreResult<Vec<AttendanceRecord>> {
        for entry in entries {
            match mark_once(self, course, date, entry).await {
                // an overlapping call inserted the record first, update it instead
                Err(StoreError::Duplicate) => mark_once(self, course, date, entry).await?,
                other => other?,
            }
        }

        let students: Vec<&str> = entries.iter().map(|it| it.student_id.as_str()).collect();
        let cursor = self
            .collection::<AttendanceRecord>(ATTENDANCE_COLLECTION_NAME)
            .find(
                doc! {
                    "course": filter::uuid(course),
                    "date": date.to_string(),
                    "student": { "$in": students },
                },
                FindOptions::builder().sort(record_order()).build(),
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn attendance_for_course(
        &self,
        course: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let mut query = filter::by_course(course);
        if let Some(date) = date {
            query.insert("date", date.to_string());
        }

        let cursor = self
            .collection::<AttendanceRecord>(ATTENDANCE_COLLECTION_NAME)
            .find(query, FindOptions::builder().sort(record_order()).build())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn attendance_for_student(&self, student: &str) -> StoreResult<Vec<AttendanceRecord>> {
        let cursor = self
            .collection::<AttendanceRecord>(ATTENDANCE_COLLECTION_NAME)
            .find(
                filter::by_student(student),
                FindOptions::builder().sort(record_order()).build(),
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(student: &str, present: bool) -> AttendanceEntry {
        AttendanceEntry {
            student_id: student.to_string(),
            present,
        }
    }

    #[test]
    fn students_listed_twice_are_rejected() {
        let data = AttendanceMarkData {
            course_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 9, 2).expect("valid date"),
            records: vec![entry("s1", true), entry("s2", false), entry("s1", false)],
        };

        let problem = data.validate().expect_err("duplicate student");
        assert!(problem.detail.unwrap_or_default().contains("s1"));
    }

    #[test]
    fn dates_parse_strictly() {
        assert_eq!(
            parse_date("2024-09-02").ok(),
            NaiveDate::from_ymd_opt(2024, 9, 2)
        );
        assert!(parse_date("02.09.2024").is_err());
        assert!(parse_date("2024-02-30").is_err());
    }
}
