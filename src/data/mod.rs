use std::sync::Arc;

use bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};
use thiserror::Error;

pub mod assignment;
pub mod attendance;
pub mod course;
pub mod filter;
pub mod memory;
pub mod notification;
pub mod registration;
pub mod user;

use assignment::db::AssignmentStore;
use attendance::db::AttendanceStore;
use course::db::CourseStore;
use notification::db::NotificationStore;
use registration::db::RegistrationStore;
use user::db::UserStore;

/// MongoDB error code for unique index violations.
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document with the same unique key already exists")]
    Duplicate,
    #[error(transparent)]
    Database(mongodb::error::Error),
    #[error(transparent)]
    Bson(#[from] bson::ser::Error),
    #[error("store returned an inconsistent result: {0}")]
    Inconsistent(&'static str),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        let duplicate = match e.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY_CODE,
            ErrorKind::Command(command) => command.code == DUPLICATE_KEY_CODE,
            ErrorKind::BulkWrite(bulk) => bulk
                .write_errors
                .as_ref()
                .map(|errors| errors.iter().any(|it| it.code == DUPLICATE_KEY_CODE))
                .unwrap_or(false),
            _ => false,
        };

        if duplicate {
            StoreError::Duplicate
        } else {
            StoreError::Database(e)
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Every collection the API works with.
pub trait Store:
    UserStore
    + CourseStore
    + RegistrationStore
    + NotificationStore
    + AssignmentStore
    + AttendanceStore
    + std::fmt::Debug
    + Send
    + Sync
{
}

impl<T> Store for T where
    T: UserStore
        + CourseStore
        + RegistrationStore
        + NotificationStore
        + AssignmentStore
        + AttendanceStore
        + std::fmt::Debug
        + Send
        + Sync
{
}

/// Store handle managed by Rocket.
pub type Db = Arc<dyn Store>;

pub mod prelude {
    pub use super::assignment::db::AssignmentStore;
    pub use super::attendance::db::AttendanceStore;
    pub use super::course::db::CourseStore;
    pub use super::notification::db::NotificationStore;
    pub use super::registration::db::RegistrationStore;
    pub use super::user::db::UserStore;
    pub use super::{Db, Store, StoreError, StoreResult};
}

fn unique_index(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

/// Creates the indexes the store relies on for its uniqueness guarantees.
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(user::db::USER_COLLECTION_NAME)
        .create_index(unique_index(doc! { "username": 1 }), None)
        .await?;

    db.collection::<bson::Document>(course::db::COURSE_COLLECTION_NAME)
        .create_index(IndexModel::builder().keys(doc! { "teacher": 1 }).build(), None)
        .await?;

    let registrations =
        db.collection::<bson::Document>(registration::db::REGISTRATION_COLLECTION_NAME);
    registrations
        .create_index(unique_index(doc! { "student": 1, "course": 1 }), None)
        .await?;
    registrations
        .create_index(
            IndexModel::builder()
                .keys(doc! { "course": 1, "status": 1 })
                .build(),
            None,
        )
        .await?;

    db.collection::<bson::Document>(notification::db::NOTIFICATION_COLLECTION_NAME)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "student": 1, "created": -1 })
                .build(),
            None,
        )
        .await?;

    db.collection::<bson::Document>(assignment::db::SUBMISSION_COLLECTION_NAME)
        .create_index(unique_index(doc! { "assignment": 1, "student": 1 }), None)
        .await?;

    db.collection::<bson::Document>(attendance::db::ATTENDANCE_COLLECTION_NAME)
        .create_index(
            unique_index(doc! { "course": 1, "date": 1, "student": 1 }),
            None,
        )
        .await?;

    Ok(())
}
