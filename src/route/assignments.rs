use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::assignment::db::problem as assignment_problem;
use crate::data::assignment::db::{AssignmentCreateData, SubmissionData};
use crate::data::assignment::{Assignment, AssignmentResponse, SubmissionResponse};
use crate::data::course::db::problem as course_problem;
use crate::data::prelude::*;
use crate::resp::problem::Problem;

async fn find_assignment(db: &dyn Store, id: Uuid) -> Result<Assignment, Problem> {
    db.get_assignment(id)
        .await?
        .ok_or_else(|| assignment_problem::not_found(id))
}

/// Create an assignment for a course
#[utoipa::path(
    request_body = AssignmentCreateData,
    responses(
        (status = 201, description = "Assignment created", body = AssignmentResponse),
        (status = 400, description = "Invalid assignment", body = Problem),
        (status = 404, description = "Course doesn't exist", body = Problem),
    )
)]
#[post("/assignments", format = "json", data = "<assignment>")]
#[tracing::instrument]
pub async fn assignment_create(
    assignment: Json<AssignmentCreateData>,
    db: &State<Db>,
) -> Result<Created<Json<AssignmentResponse>>, Problem> {
    assignment.validate()?;

    if db.get_course(assignment.course_id).await?.is_none() {
        return Err(course_problem::not_found(assignment.course_id));
    }

    let assignment = assignment.into_inner().into_assignment();
    db.insert_assignment(&assignment).await?;

    let location = format!("/api/assignments/{}", assignment.id);
    Ok(Created::new(location).body(Json(assignment.into())))
}

/// List a course's assignments
#[utoipa::path(
    params(
        ("id", description = "course ID")
    ),
    responses(
        (status = 200, description = "Assignments in creation order", body = Vec<AssignmentResponse>),
        (status = 404, description = "Course doesn't exist", body = Problem),
    )
)]
#[get("/assignments/course/<id>")]
#[tracing::instrument]
pub async fn assignment_list_for_course(
    id: Uuid,
    db: &State<Db>,
) -> Result<Json<Vec<AssignmentResponse>>, Problem> {
    if db.get_course(id).await?.is_none() {
        return Err(course_problem::not_found(id));
    }

    let assignments = db.assignments_for_course(id).await?;
    Ok(Json(
        assignments
            .into_iter()
            .map(AssignmentResponse::from)
            .collect(),
    ))
}

/// Submit work for an assignment, replacing an earlier submission
#[utoipa::path(
    params(
        ("id", description = "assignment ID")
    ),
    request_body = SubmissionData,
    responses(
        (status = 200, description = "Stored submission", body = SubmissionResponse),
        (status = 400, description = "Invalid submission", body = Problem),
        (status = 403, description = "Student isn't registered in the course", body = Problem),
        (status = 404, description = "Assignment doesn't exist", body = Problem),
    )
)]
#[post("/assignments/<id>/submissions", format = "json", data = "<submission>")]
#[tracing::instrument]
pub async fn submission_create(
    id: Uuid,
    submission: Json<SubmissionData>,
    db: &State<Db>,
) -> Result<Json<SubmissionResponse>, Problem> {
    submission.validate()?;
    let assignment = find_assignment(db.inner().as_ref(), id).await?;

    if !db
        .is_registered(&submission.student_id, assignment.course)
        .await?
    {
        return Err(assignment_problem::not_enrolled(&submission.student_id));
    }

    let stored = db
        .upsert_submission(id, &submission.student_id, &submission.content)
        .await?;
    Ok(Json(SubmissionResponse::new(stored, assignment.due)))
}

/// List submissions for an assignment
#[utoipa::path(
    params(
        ("id", description = "assignment ID")
    ),
    responses(
        (status = 200, description = "Submissions", body = Vec<SubmissionResponse>),
        (status = 404, description = "Assignment doesn't exist", body = Problem),
    )
)]
#[get("/assignments/<id>/submissions", rank = 2)]
#[tracing::instrument]
pub async fn submission_list(
    id: Uuid,
    db: &State<Db>,
) -> Result<Json<Vec<SubmissionResponse>>, Problem> {
    let assignment = find_assignment(db.inner().as_ref(), id).await?;

    let submissions = db.submissions_for(id).await?;
    Ok(Json(
        submissions
            .into_iter()
            .map(|it| SubmissionResponse::new(it, assignment.due))
            .collect(),
    ))
}

#[cfg(test)]
mod assignment_endpoints {
    use chrono::{Duration, Utc};
    use rocket::http::Status;
    use serde_json::json;
    use uuid::Uuid;

    use crate::role::Role;
    use crate::route::testing::*;

    async fn create_assignment(
        client: &rocket::local::asynchronous::Client,
        course: Uuid,
        due: chrono::DateTime<Utc>,
    ) -> Uuid {
        let response = post_json(
            client,
            "/api/assignments",
            json!({ "courseId": course, "title": "Essay", "due": due }),
        )
        .await;
        assert_eq!(response.status(), Status::Created);
        id_of(&body_json(response).await)
    }

    #[rocket::async_test]
    async fn only_registered_students_submit() {
        let client = client().await;
        let course = school(&client).await;
        signup(&client, "s2_student", Role::Student).await;
        let assignment = create_assignment(&client, course, Utc::now() + Duration::days(1)).await;

        let registration = request_registration(&client, "s1_student", course).await;
        put_json(
            &client,
            "/api/registrations/approve",
            json!({ "registrationId": registration }),
        )
        .await;

        let uri = format!("/api/assignments/{}/submissions", assignment);
        let response = post_json(
            &client,
            &uri,
            json!({ "studentId": "s2_student", "content": "my essay" }),
        )
        .await;
        assert_eq!(response.status(), Status::Forbidden);

        for content in ["first draft", "final version"] {
            let response = post_json(
                &client,
                &uri,
                json!({ "studentId": "s1_student", "content": content }),
            )
            .await;
            assert_eq!(response.status(), Status::Ok);
            assert_eq!(body_json(response).await["late"], false);
        }

        let body = body_json(client.get(uri.clone()).dispatch().await).await;
        let submissions = body.as_array().expect("list");
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0]["content"], "final version");
    }

    #[rocket::async_test]
    async fn late_submissions_are_flagged() {
        let client = client().await;
        let course = school(&client).await;
        let assignment = create_assignment(&client, course, Utc::now() - Duration::hours(1)).await;
        let registration = request_registration(&client, "s1_student", course).await;
        put_json(
            &client,
            "/api/registrations/approve",
            json!({ "registrationId": registration }),
        )
        .await;

        let response = post_json(
            &client,
            &format!("/api/assignments/{}/submissions", assignment),
            json!({ "studentId": "s1_student", "content": "sorry" }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body_json(response).await["late"], true);

        let body = body_json(
            client
                .get(format!("/api/assignments/course/{}", course))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(body.as_array().map(|it| it.len()), Some(1));
    }

    #[rocket::async_test]
    async fn assignments_need_existing_courses() {
        let client = client().await;
        let response = post_json(
            &client,
            "/api/assignments",
            json!({ "courseId": Uuid::new_v4(), "title": "Essay" }),
        )
        .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .get(format!("/api/assignments/{}/submissions", Uuid::new_v4()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
