use std::collections::BTreeMap;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Catcher, Request, Rocket, Route};

pub mod assignments;
pub mod attendance;
pub mod courses;
pub mod notifications;
pub mod registrations;
pub mod users;

use assignments::*;
use attendance::*;
use courses::*;
use notifications::*;
use registrations::*;
use users::*;

use utoipa::OpenApi;

use crate::{
    data::{
        assignment::db::{AssignmentCreateData, SubmissionData},
        assignment::{AssignmentResponse, SubmissionResponse},
        attendance::db::{AttendanceEntry, AttendanceMarkData},
        attendance::AttendanceResponse,
        course::db::{CourseCreateData, CourseUpdateData},
        course::CourseResponse,
        notification::{NotificationResponse, NotificationType},
        registration::db::{
            RegistrationApproveData, RegistrationRequestData, RegistrationRespondData,
        },
        registration::workflow::RespondResponse,
        registration::{RegistrationResponse, RegistrationStatus},
        user::db::{LoginResponse, UserLoginData, UserSignupData},
        user::UserResponse,
    },
    resp::{
        jwt::{auth_problem, doc::JWTAuth, GuardFailure},
        problem::{problems, Problem},
    },
    role::Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        user_signup,
        user_login,
        user_me,
        user_get,
        course_create,
        course_list,
        course_get,
        course_list_by_teacher,
        course_update,
        course_delete,
        registration_request,
        registration_status,
        registration_list_for_student,
        registration_pending,
        registration_respond,
        registration_approve,
        registration_reject,
        registration_cancel,
        notification_list,
        notification_mark_read,
        assignment_create,
        assignment_list_for_course,
        submission_create,
        submission_list,
        attendance_mark,
        attendance_list_for_course,
        attendance_list_for_student
    ),
    components(schemas(
        Role,
        UserResponse,
        UserLoginData,
        UserSignupData,
        LoginResponse,
        CourseCreateData,
        CourseUpdateData,
        CourseResponse,
        RegistrationStatus,
        RegistrationRequestData,
        RegistrationRespondData,
        RegistrationApproveData,
        RegistrationResponse,
        RespondResponse,
        NotificationType,
        NotificationResponse,
        AssignmentCreateData,
        AssignmentResponse,
        SubmissionData,
        SubmissionResponse,
        AttendanceEntry,
        AttendanceMarkData,
        AttendanceResponse,
        Problem
    )),
    modifiers(&JWTAuth, &API_PREFIX)
)]
pub struct ApiDoc;

pub struct PathPrefix(pub &'static str);
static API_PREFIX: PathPrefix = PathPrefix("/api");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

#[get("/openapi.json")]
pub fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn api_routes() -> Vec<Route> {
    routes![
        openapi_json,
        user_signup,
        user_login,
        user_me,
        user_get,
        course_create,
        course_list,
        course_get,
        course_list_by_teacher,
        course_update,
        course_delete,
        registration_request,
        registration_status,
        registration_list_for_student,
        registration_pending,
        registration_respond,
        registration_approve,
        registration_reject,
        registration_cancel,
        notification_list,
        notification_mark_read,
        assignment_create,
        assignment_list_for_course,
        submission_create,
        submission_list,
        attendance_mark,
        attendance_list_for_course,
        attendance_list_for_student
    ]
}

#[catch(401)]
fn unauthorized(req: &Request) -> Problem {
    req.local_cache(|| GuardFailure(None))
        .0
        .clone()
        .unwrap_or_else(|| auth_problem("Missing or invalid bearer token."))
}

#[catch(400)]
fn bad_request(req: &Request) -> Problem {
    problems::parse_problem().instance_uri(req.uri())
}

#[catch(422)]
fn unprocessable(req: &Request) -> Problem {
    problems::parse_problem()
        .detail("Request body doesn't match the expected shape.")
        .instance_uri(req.uri())
}

#[catch(404)]
fn not_found(req: &Request) -> Problem {
    Problem::new_untyped(Status::NotFound, "Resource doesn't exist.").instance_uri(req.uri())
}

#[catch(default)]
fn default_catcher(status: Status, req: &Request) -> Problem {
    Problem::new_untyped(status, status.reason().unwrap_or("Request failed."))
        .instance_uri(req.uri())
}

pub fn api_catchers() -> Vec<Catcher> {
    catchers![unauthorized, bad_request, unprocessable, not_found, default_catcher]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api", api_routes())
        .register("/", api_catchers())
}
