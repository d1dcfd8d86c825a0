use bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{filter, StoreResult};
use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;

use super::Course;

pub static COURSE_COLLECTION_NAME: &str = "courses";

pub mod problem {
    use crate::resp::problem::{problems, Problem};
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        problems::not_found("Course", id)
    }

    #[inline]
    pub fn bad_name(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad course name.").detail(detail)
    }
}

const MAX_NAME_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 10_000;

fn validate_name(name: &str) -> Result<(), Problem> {
    if name.trim().is_empty() {
        return Err(problem::bad_name("Course name can't be empty."));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(problem::bad_name(format!(
            "Course name can't be longer than {} characters (bytes).",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), Problem> {
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(
            Problem::new_untyped(rocket::http::Status::BadRequest, "Bad course description.")
                .detail("Course description is too long."),
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CourseCreateData {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Username of the owning teacher.
    pub teacher: String,
}

impl CourseCreateData {
    pub fn validate(&self) -> Result<(), Problem> {
        validate_name(&self.name)?;
        validate_description(&self.description)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CourseUpdateData {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl CourseUpdateData {
    pub fn validate(&self) -> Result<(), Problem> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    pub fn apply(&self, course: &mut Course) {
        if let Some(name) = &self.name {
            course.name = name.clone();
        }
        if let Some(description) = &self.description {
            course.description = description.clone();
        }
    }

    fn set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(name) = &self.name {
            set.insert("name", name.clone());
        }
        if let Some(description) = &self.description {
            set.insert("description", description.clone());
        }
        set
    }
}

#[rocket::async_trait]
pub trait CourseStore: Send + Sync {
    async fn insert_course(&self, course: &Course) -> StoreResult<()>;

    async fn get_course(&self, id: Uuid) -> StoreResult<Option<Course>>;

    /// Courses for `ids` that exist, in creation order.
    async fn get_courses(&self, ids: &[Uuid]) -> StoreResult<Vec<Course>>;

    async fn list_courses(&self, page: PageState) -> StoreResult<Vec<Course>>;

    async fn courses_by_teacher(&self, teacher: &str) -> StoreResult<Vec<Course>>;

    /// Last writer wins.
    async fn update_course(&self, id: Uuid, update: &CourseUpdateData)
        -> StoreResult<Option<Course>>;

    async fn delete_course(&self, id: Uuid) -> StoreResult<Option<Course>>;
}

fn creation_order() -> Document {
    doc! { "created": 1, "_id": 1 }
}

#[rocket::async_trait]
impl CourseStore for Database {
    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        self.collection::<Course>(COURSE_COLLECTION_NAME)
            .insert_one(course, None)
            .await?;
        Ok(())
    }

    async fn get_course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(self
            .collection::<Course>(COURSE_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?)
    }

    async fn get_courses(&self, ids: &[Uuid]) -> StoreResult<Vec<Course>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let cursor = self
            .collection::<Course>(COURSE_COLLECTION_NAME)
            .find(
                doc! { "_id": { "$in": filter::uuids(ids) } },
                FindOptions::builder().sort(creation_order()).build(),
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_courses(&self, page: PageState) -> StoreResult<Vec<Course>> {
        let options = FindOptions::builder()
            .sort(creation_order())
            .skip(page.skip())
            .limit(page.page_length as i64)
            .build();

        let cursor = self
            .collection::<Course>(COURSE_COLLECTION_NAME)
            .find(None, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn courses_by_teacher(&self, teacher: &str) -> StoreResult<Vec<Course>> {
        let cursor = self
            .collection::<Course>(COURSE_COLLECTION_NAME)
            .find(
                doc! { "teacher": teacher },
                FindOptions::builder().sort(creation_order()).build(),
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_course(
        &self,
        id: Uuid,
        update: &CourseUpdateData,
    ) -> StoreResult<Option<Course>> {
        let set = update.set_document();
        if set.is_empty() {
            return self.get_course(id).await;
        }

        Ok(self
            .collection::<Course>(COURSE_COLLECTION_NAME)
            .find_one_and_update(
                filter::by_id(id),
                doc! { "$set": set },
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?)
    }

    async fn delete_course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(self
            .collection::<Course>(COURSE_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_only_touches_given_fields() {
        let mut course = Course::new("Algebra", "Groups and rings", "teacher_ana");
        let update = CourseUpdateData {
            name: Some("Linear algebra".to_string()),
            description: None,
        };

        update.apply(&mut course);
        assert_eq!(course.name, "Linear algebra");
        assert_eq!(course.description, "Groups and rings");
        assert_eq!(update.set_document(), doc! { "name": "Linear algebra" });
    }

    #[test]
    fn blank_names_are_rejected() {
        let data = CourseCreateData {
            name: "   ".to_string(),
            description: String::new(),
            teacher: "teacher_ana".to_string(),
        };
        assert!(data.validate().is_err());
    }
}
