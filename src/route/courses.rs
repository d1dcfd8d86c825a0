use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::course::db::problem as course_problem;
use crate::data::course::db::{CourseCreateData, CourseUpdateData};
use crate::data::course::{Course, CourseResponse};
use crate::data::prelude::*;
use crate::data::user::db::problem as user_problem;
use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;
use crate::role::Role;

fn responses(courses: Vec<Course>) -> Json<Vec<CourseResponse>> {
    Json(courses.into_iter().map(CourseResponse::from).collect())
}

/// Create a course owned by a teacher
#[utoipa::path(
    request_body = CourseCreateData,
    responses(
        (status = 201, description = "Course created", body = CourseResponse),
        (status = 400, description = "Invalid course or the owner isn't a teacher", body = Problem),
        (status = 404, description = "Teacher doesn't exist", body = Problem),
    )
)]
#[post("/courses", format = "json", data = "<course>")]
#[tracing::instrument]
pub async fn course_create(
    course: Json<CourseCreateData>,
    db: &State<Db>,
) -> Result<Created<Json<CourseResponse>>, Problem> {
    course.validate()?;
    let data = course.into_inner();

    let teacher = db
        .find_user_by_username(&data.teacher)
        .await?
        .ok_or_else(|| user_problem::not_found(&data.teacher))?;
    if !teacher.role.can_teach() {
        return Err(user_problem::wrong_role(&data.teacher, Role::Teacher));
    }

    let course = Course::new(data.name, data.description, teacher.username);
    db.insert_course(&course).await?;
    tracing::info!("{} created course {}", course.teacher, course.id);

    let location = format!("/api/courses/{}", course.id);
    Ok(Created::new(location).body(Json(course.into())))
}

/// List courses
#[utoipa::path(
    params(
        ("page" = Option<u32>, Query, description = "page number, starting at 0"),
        ("len" = Option<u32>, Query, description = "page length, at most 100"),
    ),
    responses(
        (status = 200, description = "Page of courses in creation order", body = Vec<CourseResponse>),
    )
)]
#[get("/courses")]
#[tracing::instrument]
pub async fn course_list(
    page: PageState,
    db: &State<Db>,
) -> Result<Json<Vec<CourseResponse>>, Problem> {
    Ok(responses(db.list_courses(page).await?))
}

/// Get course information
#[utoipa::path(
    params(
        ("id", description = "course ID")
    ),
    responses(
        (status = 200, description = "Course", body = CourseResponse),
        (status = 404, description = "Course doesn't exist", body = Problem),
    )
)]
#[get("/courses/<id>")]
#[tracing::instrument]
pub async fn course_get(id: Uuid, db: &State<Db>) -> Result<Json<CourseResponse>, Problem> {
    db.get_course(id)
        .await?
        .map(|course| Json(course.into()))
        .ok_or_else(|| course_problem::not_found(id))
}

/// List courses taught by a teacher
#[utoipa::path(
    params(
        ("username", description = "teacher username")
    ),
    responses(
        (status = 200, description = "Teacher's courses", body = Vec<CourseResponse>),
        (status = 404, description = "Teacher doesn't exist", body = Problem),
    )
)]
#[get("/courses/teacher/<username>")]
#[tracing::instrument]
pub async fn course_list_by_teacher(
    username: &str,
    db: &State<Db>,
) -> Result<Json<Vec<CourseResponse>>, Problem> {
    if db.find_user_by_username(username).await?.is_none() {
        return Err(user_problem::not_found(username));
    }

    Ok(responses(db.courses_by_teacher(username).await?))
}

/// Edit course name or description
#[utoipa::path(
    params(
        ("id", description = "course ID")
    ),
    request_body = CourseUpdateData,
    responses(
        (status = 200, description = "Updated course", body = CourseResponse),
        (status = 400, description = "Invalid values", body = Problem),
        (status = 404, description = "Course doesn't exist", body = Problem),
    )
)]
#[put("/courses/<id>", format = "json", data = "<update>")]
#[tracing::instrument]
pub async fn course_update(
    id: Uuid,
    update: Json<CourseUpdateData>,
    db: &State<Db>,
) -> Result<Json<CourseResponse>, Problem> {
    update.validate()?;

    db.update_course(id, &update)
        .await?
        .map(|course| Json(course.into()))
        .ok_or_else(|| course_problem::not_found(id))
}

/// Delete a course along with its registrations
#[utoipa::path(
    params(
        ("id", description = "course ID")
    ),
    responses(
        (status = 200, description = "Deleted course", body = CourseResponse),
        (status = 404, description = "Course doesn't exist", body = Problem),
    )
)]
#[delete("/courses/<id>")]
#[tracing::instrument]
pub async fn course_delete(id: Uuid, db: &State<Db>) -> Result<Json<CourseResponse>, Problem> {
    let course = db
        .delete_course(id)
        .await?
        .ok_or_else(|| course_problem::not_found(id))?;

    let registrations = db.delete_course_registrations(id).await?;
    let students = db.remove_course_from_users(id).await?;
    tracing::info!(
        "Deleted course {} with {} registrations, unlisted from {} users",
        id,
        registrations,
        students
    );

    Ok(Json(course.into()))
}

#[cfg(test)]
mod course_endpoints {
    use rocket::http::Status;
    use serde_json::json;

    use crate::role::Role;
    use crate::route::testing::*;

    #[rocket::async_test]
    async fn courses_belong_to_teachers() {
        let client = client().await;
        signup(&client, "t1_teacher", Role::Teacher).await;
        signup(&client, "s1_student", Role::Student).await;

        let response = post_json(
            &client,
            "/api/courses",
            json!({ "name": "Algebra", "teacher": "s1_student" }),
        )
        .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = post_json(
            &client,
            "/api/courses",
            json!({ "name": "Algebra", "teacher": "nobody" }),
        )
        .await;
        assert_eq!(response.status(), Status::NotFound);

        create_course(&client, "Algebra", "t1_teacher").await;
        create_course(&client, "Geometry", "t1_teacher").await;

        let response = client.get("/api/courses/teacher/t1_teacher").dispatch().await;
        let body = body_json(response).await;
        let mut names: Vec<&str> = body
            .as_array()
            .expect("list")
            .iter()
            .filter_map(|it| it["name"].as_str())
            .collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Algebra", "Geometry"]);

        let response = client.get("/api/courses?len=1&page=1").dispatch().await;
        let body = body_json(response).await;
        assert_eq!(body.as_array().map(|it| it.len()), Some(1));

        let response = client.get("/api/courses?len=5&page=1").dispatch().await;
        let body = body_json(response).await;
        assert_eq!(body.as_array().map(|it| it.len()), Some(0));
    }

    #[rocket::async_test]
    async fn updates_only_touch_given_fields() {
        let client = client().await;
        let course = school(&client).await;

        let response = put_json(
            &client,
            &format!("/api/courses/{}", course),
            json!({ "description": "Groups and rings" }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);

        let body = body_json(client.get(format!("/api/courses/{}", course)).dispatch().await).await;
        assert_eq!(body["name"], "Algebra");
        assert_eq!(body["description"], "Groups and rings");
    }

    #[rocket::async_test]
    async fn deleting_a_course_drops_its_registrations() {
        let client = client().await;
        let course = school(&client).await;
        let registration = request_registration(&client, "s1_student", course).await;

        let response = client
            .delete(format!("/api/courses/{}", course))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .delete(format!("/api/registrations/{}", registration))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client.get(format!("/api/courses/{}", course)).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
