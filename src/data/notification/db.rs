use bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument, UpdateOptions};
use mongodb::Database;
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use crate::data::{filter, StoreError, StoreResult};

use super::Notification;

pub static NOTIFICATION_COLLECTION_NAME: &str = "notifications";

pub mod problem {
    use crate::resp::problem::{problems, Problem};
    use uuid::Uuid;

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        problems::not_found("Notification", id)
    }
}

#[rocket::async_trait]
pub trait NotificationStore: Send + Sync {
    /// Stores the notification unless one with the same id exists already.
    async fn upsert_notification(&self, notification: &Notification) -> StoreResult<()>;

    /// Newest first.
    async fn notifications_for(&self, student: &str) -> StoreResult<Vec<Notification>>;

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<Option<Notification>>;
}

#[rocket::async_trait]
impl NotificationStore for Database {
    async fn upsert_notification(&self, notification: &Notification) -> StoreResult<()> {
        let mut document = bson::to_document(notification)?;
        document.remove("_id");

        let result = self
            .collection::<Notification>(NOTIFICATION_COLLECTION_NAME)
            .update_one(
                filter::by_id(notification.id),
                doc! { "$setOnInsert": document },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            // lost an upsert race on _id, the other writer stored it
            Err(e) => match StoreError::from(e) {
                StoreError::Duplicate => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn notifications_for(&self, student: &str) -> StoreResult<Vec<Notification>> {
        let cursor = self
            .collection::<Notification>(NOTIFICATION_COLLECTION_NAME)
            .find(
                filter::by_student(student),
                FindOptions::builder()
                    .sort(doc! { "created": -1, "_id": 1 })
                    .build(),
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        Ok(self
            .collection::<Notification>(NOTIFICATION_COLLECTION_NAME)
            .find_one_and_update(
                filter::by_id(id),
                doc! { "$set": { "read": true } },
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?)
    }
}
