use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::attendance::db::problem as attendance_problem;
use crate::data::attendance::db::{parse_date, AttendanceMarkData};
use crate::data::attendance::{AttendanceRecord, AttendanceResponse};
use crate::data::course::db::problem as course_problem;
use crate::data::prelude::*;
use crate::resp::problem::Problem;

fn responses(records: Vec<AttendanceRecord>) -> Json<Vec<AttendanceResponse>> {
    Json(records.into_iter().map(AttendanceResponse::from).collect())
}

/// Mark attendance of registered students for one day
#[utoipa::path(
    request_body = AttendanceMarkData,
    responses(
        (status = 200, description = "Stored records of the listed students", body = Vec<AttendanceResponse>),
        (status = 400, description = "Invalid list or students not registered in the course", body = Problem),
        (status = 404, description = "Course doesn't exist", body = Problem),
    )
)]
#[post("/attendance", format = "json", data = "<attendance>")]
#[tracing::instrument]
pub async fn attendance_mark(
    attendance: Json<AttendanceMarkData>,
    db: &State<Db>,
) -> Result<Json<Vec<AttendanceResponse>>, Problem> {
    attendance.validate()?;

    if db.get_course(attendance.course_id).await?.is_none() {
        return Err(course_problem::not_found(attendance.course_id));
    }

    let mut unregistered = vec![];
    for entry in &attendance.records {
        if !db
            .is_registered(&entry.student_id, attendance.course_id)
            .await?
        {
            unregistered.push(entry.student_id.clone());
        }
    }
    if !unregistered.is_empty() {
        return Err(attendance_problem::not_enrolled(&unregistered));
    }

    let records = db
        .upsert_attendance(attendance.course_id, attendance.date, &attendance.records)
        .await?;
    tracing::info!(
        "Marked {} students in course {} on {}",
        records.len(),
        attendance.course_id,
        attendance.date
    );

    Ok(responses(records))
}

/// List attendance records of a course
#[utoipa::path(
    params(
        ("id", description = "course ID"),
        ("date" = Option<String>, Query, description = "only records of this day, formatted as YYYY-MM-DD"),
    ),
    responses(
        (status = 200, description = "Attendance records by date and student", body = Vec<AttendanceResponse>),
        (status = 400, description = "Malformed date", body = Problem),
        (status = 404, description = "Course doesn't exist", body = Problem),
    )
)]
#[get("/attendance/course/<id>?<date>")]
#[tracing::instrument]
pub async fn attendance_list_for_course(
    id: Uuid,
    date: Option<&str>,
    db: &State<Db>,
) -> Result<Json<Vec<AttendanceResponse>>, Problem> {
    let date = date.map(parse_date).transpose()?;

    if db.get_course(id).await?.is_none() {
        return Err(course_problem::not_found(id));
    }

    Ok(responses(db.attendance_for_course(id, date).await?))
}

/// List a student's attendance records
#[utoipa::path(
    params(
        ("username", description = "student username")
    ),
    responses(
        (status = 200, description = "Attendance records by date", body = Vec<AttendanceResponse>),
    )
)]
#[get("/attendance/student/<username>")]
#[tracing::instrument]
pub async fn attendance_list_for_student(
    username: &str,
    db: &State<Db>,
) -> Result<Json<Vec<AttendanceResponse>>, Problem> {
    Ok(responses(db.attendance_for_student(username).await?))
}

#[cfg(test)]
mod attendance_endpoints {
    use rocket::http::Status;
    use serde_json::json;
    use uuid::Uuid;

    use crate::role::Role;
    use crate::route::testing::*;

    async fn registered_school(client: &rocket::local::asynchronous::Client) -> Uuid {
        let course = school(client).await;
        let registration = request_registration(client, "s1_student", course).await;
        put_json(
            client,
            "/api/registrations/approve",
            json!({ "registrationId": registration }),
        )
        .await;
        course
    }

    #[rocket::async_test]
    async fn remarking_replaces_records() {
        let client = client().await;
        let course = registered_school(&client).await;

        for present in [false, true] {
            let response = post_json(
                &client,
                "/api/attendance",
                json!({
                    "courseId": course,
                    "date": "2024-09-02",
                    "records": [{ "studentId": "s1_student", "present": present }],
                }),
            )
            .await;
            assert_eq!(response.status(), Status::Ok);
        }

        let body = body_json(
            client
                .get(format!("/api/attendance/course/{}?date=2024-09-02", course))
                .dispatch()
                .await,
        )
        .await;
        let records = body.as_array().expect("list");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["present"], true);
        assert_eq!(records[0]["date"], "2024-09-02");

        let body = body_json(
            client
                .get(format!("/api/attendance/course/{}?date=2024-09-03", course))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(body.as_array().map(|it| it.len()), Some(0));

        let body = body_json(
            client
                .get("/api/attendance/student/s1_student")
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(body.as_array().map(|it| it.len()), Some(1));
    }

    #[rocket::async_test]
    async fn unregistered_students_are_listed() {
        let client = client().await;
        let course = registered_school(&client).await;
        signup(&client, "s2_student", Role::Student).await;

        let response = post_json(
            &client,
            "/api/attendance",
            json!({
                "courseId": course,
                "date": "2024-09-02",
                "records": [
                    { "studentId": "s1_student", "present": true },
                    { "studentId": "s2_student", "present": true },
                ],
            }),
        )
        .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(body_json(response).await["studentIds"], json!(["s2_student"]));

        let response = client
            .get(format!("/api/attendance/course/{}?date=02.09.2024", course))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(body_json(response).await["title"], "Bad date.");
    }
}
