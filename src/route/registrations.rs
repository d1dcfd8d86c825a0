use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::course::CourseResponse;
use crate::data::prelude::*;
use crate::data::registration::db::problem as registration_problem;
use crate::data::registration::db::{
    RegistrationApproveData, RegistrationRequestData, RegistrationRespondData,
};
use crate::data::registration::workflow::{self, RespondResponse};
use crate::data::registration::{Decision, RegistrationResponse};
use crate::resp::problem::Problem;

/// Request registration for a course
#[utoipa::path(
    request_body = RegistrationRequestData,
    responses(
        (status = 201, description = "Pending registration", body = RegistrationResponse),
        (status = 400, description = "Already registered, or the user isn't a student", body = Problem),
        (status = 404, description = "Student or course doesn't exist", body = Problem),
    )
)]
#[post("/registrations", format = "json", data = "<request>")]
#[tracing::instrument]
pub async fn registration_request(
    request: Json<RegistrationRequestData>,
    db: &State<Db>,
) -> Result<Created<Json<RegistrationResponse>>, Problem> {
    let registration =
        workflow::request_course(db.inner().as_ref(), &request.student_id, request.course_id)
            .await?;

    let location = format!("/api/registrations/{}", registration.id);
    Ok(Created::new(location).body(Json(registration.into())))
}

/// List courses a student is registered in
#[utoipa::path(
    params(
        ("username", description = "student username")
    ),
    responses(
        (status = 200, description = "Registered courses", body = Vec<CourseResponse>),
        (status = 404, description = "Student doesn't exist", body = Problem),
    )
)]
#[get("/registrations/status/<username>")]
#[tracing::instrument]
pub async fn registration_status(
    username: &str,
    db: &State<Db>,
) -> Result<Json<Vec<CourseResponse>>, Problem> {
    let courses = workflow::list_approved_for_student(db.inner().as_ref(), username).await?;
    Ok(Json(courses.into_iter().map(CourseResponse::from).collect()))
}

/// List a student's pending and registered registrations
#[utoipa::path(
    params(
        ("username", description = "student username")
    ),
    responses(
        (status = 200, description = "Registrations that aren't rejected", body = Vec<RegistrationResponse>),
        (status = 404, description = "Student doesn't exist", body = Problem),
    )
)]
#[get("/registrations/student/<username>")]
#[tracing::instrument]
pub async fn registration_list_for_student(
    username: &str,
    db: &State<Db>,
) -> Result<Json<Vec<RegistrationResponse>>, Problem> {
    Ok(Json(workflow::list_for_student(db.inner().as_ref(), username).await?))
}

/// List registrations awaiting a teacher's decision
#[utoipa::path(
    params(
        ("teacher", description = "teacher username")
    ),
    responses(
        (status = 200, description = "Pending registrations for the teacher's courses", body = Vec<RegistrationResponse>),
        (status = 404, description = "Teacher doesn't exist", body = Problem),
    )
)]
#[get("/registrations/pending/<teacher>")]
#[tracing::instrument]
pub async fn registration_pending(
    teacher: &str,
    db: &State<Db>,
) -> Result<Json<Vec<RegistrationResponse>>, Problem> {
    Ok(Json(workflow::list_pending(db.inner().as_ref(), teacher).await?))
}

/// Approve or reject a registration
#[utoipa::path(
    request_body = RegistrationRespondData,
    responses(
        (status = 200, description = "Registration after the decision", body = RespondResponse),
        (status = 400, description = "Unknown status", body = Problem),
        (status = 404, description = "Registration doesn't exist", body = Problem),
        (status = 409, description = "Registration was already decided the other way", body = Problem),
    )
)]
#[post("/registrations/respond", format = "json", data = "<response>")]
#[tracing::instrument]
pub async fn registration_respond(
    response: Json<RegistrationRespondData>,
    db: &State<Db>,
) -> Result<Json<RespondResponse>, Problem> {
    let decision: Decision = response
        .status
        .parse()
        .map_err(|_| registration_problem::bad_status(&response.status))?;

    let outcome = workflow::respond(db.inner().as_ref(), response.registration_id, decision).await?;
    Ok(Json(outcome.into()))
}

/// Approve a registration
#[utoipa::path(
    request_body = RegistrationApproveData,
    responses(
        (status = 200, description = "Registered", body = RespondResponse),
        (status = 404, description = "Registration doesn't exist", body = Problem),
        (status = 409, description = "Registration was already rejected", body = Problem),
    )
)]
#[put("/registrations/approve", format = "json", data = "<approval>")]
#[tracing::instrument]
pub async fn registration_approve(
    approval: Json<RegistrationApproveData>,
    db: &State<Db>,
) -> Result<Json<RespondResponse>, Problem> {
    let outcome = workflow::respond(db.inner().as_ref(), approval.registration_id, Decision::Approve).await?;
    Ok(Json(outcome.into()))
}

/// Reject a registration
#[utoipa::path(
    params(
        ("id", description = "registration ID")
    ),
    responses(
        (status = 200, description = "Rejected", body = RespondResponse),
        (status = 404, description = "Registration doesn't exist", body = Problem),
        (status = 409, description = "Registration was already approved", body = Problem),
    )
)]
#[delete("/registrations/reject/<id>")]
#[tracing::instrument]
pub async fn registration_reject(
    id: Uuid,
    db: &State<Db>,
) -> Result<Json<RespondResponse>, Problem> {
    let outcome = workflow::respond(db.inner().as_ref(), id, Decision::Reject).await?;
    Ok(Json(outcome.into()))
}

/// Withdraw a pending registration
#[utoipa::path(
    params(
        ("id", description = "registration ID")
    ),
    responses(
        (status = 200, description = "Withdrawn registration", body = RegistrationResponse),
        (status = 404, description = "Registration doesn't exist", body = Problem),
        (status = 409, description = "Registration was already decided", body = Problem),
    )
)]
#[delete("/registrations/<id>")]
#[tracing::instrument]
pub async fn registration_cancel(
    id: Uuid,
    db: &State<Db>,
) -> Result<Json<RegistrationResponse>, Problem> {
    let registration = workflow::cancel(db.inner().as_ref(), id).await?;
    Ok(Json(registration.into()))
}

#[cfg(test)]
mod registration_endpoints {
    use rocket::futures::future::join_all;
    use rocket::http::{ContentType, Status};
    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::route::testing::*;

    async fn status_courses(client: &rocket::local::asynchronous::Client) -> Vec<Value> {
        let response = client
            .get("/api/registrations/status/s1_student")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        body_json(response)
            .await
            .as_array()
            .cloned()
            .expect("list")
    }

    async fn pending(client: &rocket::local::asynchronous::Client) -> Vec<Value> {
        let response = client
            .get("/api/registrations/pending/t1_teacher")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        body_json(response)
            .await
            .as_array()
            .cloned()
            .expect("list")
    }

    async fn notifications(client: &rocket::local::asynchronous::Client) -> Vec<Value> {
        let response = client.get("/api/notifications/s1_student").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        body_json(response)
            .await
            .as_array()
            .cloned()
            .expect("list")
    }

    #[rocket::async_test]
    async fn duplicate_requests_are_rejected() {
        let client = client().await;
        let course = school(&client).await;
        request_registration(&client, "s1_student", course).await;

        let response = post_json(
            &client,
            "/api/registrations",
            json!({ "studentId": "s1_student", "courseId": course }),
        )
        .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(
            body_json(response).await["title"],
            "Already registered for this course."
        );
    }

    #[rocket::async_test]
    async fn concurrent_duplicates_succeed_once() {
        let client = client().await;
        let course = school(&client).await;
        let body = json!({ "studentId": "s1_student", "courseId": course }).to_string();

        let requests = (0..8).map(|_| {
            client
                .post("/api/registrations")
                .header(ContentType::JSON)
                .body(body.clone())
                .dispatch()
        });
        let statuses: Vec<Status> = join_all(requests)
            .await
            .iter()
            .map(|it| it.status())
            .collect();

        assert_eq!(statuses.iter().filter(|it| **it == Status::Created).count(), 1);
        assert!(statuses
            .iter()
            .all(|it| *it == Status::Created || *it == Status::BadRequest));
        assert_eq!(pending(&client).await.len(), 1);
    }

    #[rocket::async_test]
    async fn approval_registers_the_student() {
        let client = client().await;
        let course = school(&client).await;
        let registration = request_registration(&client, "s1_student", course).await;

        let pending_before = pending(&client).await;
        assert_eq!(pending_before.len(), 1);
        assert_eq!(pending_before[0]["courseName"], "Algebra");
        assert!(status_courses(&client).await.is_empty());

        for _ in 0..2 {
            let response = put_json(
                &client,
                "/api/registrations/approve",
                json!({ "registrationId": registration }),
            )
            .await;
            assert_eq!(response.status(), Status::Ok);
            let body = body_json(response).await;
            assert_eq!(body["registration"]["status"], "registered");
            assert_eq!(body["notified"], true);
        }

        assert!(pending(&client).await.is_empty());
        let courses = status_courses(&client).await;
        assert_eq!(courses.len(), 1);
        assert_eq!(id_of(&courses[0]), course);

        let notifications = notifications(&client).await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["type"], "approval");
        assert_eq!(notifications[0]["read"], false);
    }

    #[rocket::async_test]
    async fn rejection_removes_the_registration() {
        let client = client().await;
        let course = school(&client).await;
        let registration = request_registration(&client, "s1_student", course).await;

        let response = post_json(
            &client,
            "/api/registrations/respond",
            json!({ "registrationId": registration, "status": "rejected" }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body_json(response).await["registration"]["status"], "rejected");

        assert!(pending(&client).await.is_empty());
        assert!(status_courses(&client).await.is_empty());

        let notifications = notifications(&client).await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["type"], "rejection");

        let response = client
            .get("/api/registrations/student/s1_student")
            .dispatch()
            .await;
        assert_eq!(body_json(response).await.as_array().map(|it| it.len()), Some(0));

        // finished rejections are gone, repeating one finds nothing
        let response = client
            .delete(format!("/api/registrations/reject/{}", registration))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        request_registration(&client, "s1_student", course).await;
    }

    #[rocket::async_test]
    async fn registered_courses_cant_be_rejected() {
        let client = client().await;
        let course = school(&client).await;
        let registration = request_registration(&client, "s1_student", course).await;

        let response = post_json(
            &client,
            "/api/registrations/respond",
            json!({ "registrationId": registration, "status": "approved" }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .delete(format!("/api/registrations/reject/{}", registration))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
        assert_eq!(
            body_json(response).await["title"],
            "Registration is already registered."
        );

        let response = client
            .delete(format!("/api/registrations/{}", registration))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
        assert_eq!(status_courses(&client).await.len(), 1);
    }

    #[rocket::async_test]
    async fn respond_checks_its_input() {
        let client = client().await;
        let course = school(&client).await;
        let registration = request_registration(&client, "s1_student", course).await;

        let response = post_json(
            &client,
            "/api/registrations/respond",
            json!({ "registrationId": registration, "status": "maybe" }),
        )
        .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(body_json(response).await["title"], "Unknown registration status.");

        let response = post_json(
            &client,
            "/api/registrations/respond",
            json!({ "registrationId": Uuid::new_v4(), "status": "approved" }),
        )
        .await;
        assert_eq!(response.status(), Status::NotFound);

        assert_eq!(pending(&client).await.len(), 1);
    }

    #[rocket::async_test]
    async fn pending_requests_can_be_withdrawn() {
        let client = client().await;
        let course = school(&client).await;
        let registration = request_registration(&client, "s1_student", course).await;

        let response = client
            .delete(format!("/api/registrations/{}", registration))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert!(pending(&client).await.is_empty());
        assert!(notifications(&client).await.is_empty());
    }
}
