use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::notification::db::problem as notification_problem;
use crate::data::notification::NotificationResponse;
use crate::data::prelude::*;
use crate::data::user::db::problem as user_problem;
use crate::resp::problem::Problem;

/// List a student's notifications, newest first
#[utoipa::path(
    params(
        ("username", description = "student username")
    ),
    responses(
        (status = 200, description = "Notifications", body = Vec<NotificationResponse>),
        (status = 404, description = "Student doesn't exist", body = Problem),
    )
)]
#[get("/notifications/<username>")]
#[tracing::instrument]
pub async fn notification_list(
    username: &str,
    db: &State<Db>,
) -> Result<Json<Vec<NotificationResponse>>, Problem> {
    if db.find_user_by_username(username).await?.is_none() {
        return Err(user_problem::not_found(username));
    }

    let notifications = db.notifications_for(username).await?;
    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    ))
}

/// Mark a notification as read
#[utoipa::path(
    params(
        ("id", description = "notification ID")
    ),
    responses(
        (status = 200, description = "Updated notification", body = NotificationResponse),
        (status = 404, description = "Notification doesn't exist", body = Problem),
    )
)]
#[put("/notifications/<id>/read")]
#[tracing::instrument]
pub async fn notification_mark_read(
    id: Uuid,
    db: &State<Db>,
) -> Result<Json<NotificationResponse>, Problem> {
    db.mark_notification_read(id)
        .await?
        .map(|it| Json(it.into()))
        .ok_or_else(|| notification_problem::not_found(id))
}

#[cfg(test)]
mod notification_endpoints {
    use rocket::http::Status;
    use serde_json::json;
    use uuid::Uuid;

    use crate::route::testing::*;

    #[rocket::async_test]
    async fn notifications_can_be_marked_read() {
        let client = client().await;
        let course = school(&client).await;
        let registration = request_registration(&client, "s1_student", course).await;
        put_json(
            &client,
            "/api/registrations/approve",
            json!({ "registrationId": registration }),
        )
        .await;

        let body = body_json(client.get("/api/notifications/s1_student").dispatch().await).await;
        let notification = id_of(&body[0]);
        assert_eq!(body[0]["studentId"], "s1_student");
        assert_eq!(
            body[0]["message"],
            "Your registration for \"Algebra\" has been approved."
        );

        let response = client
            .put(format!("/api/notifications/{}/read", notification))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body_json(response).await["read"], true);

        let response = client
            .put(format!("/api/notifications/{}/read", Uuid::new_v4()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client.get("/api/notifications/nobody").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
