use rocket::http::Status;
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::prelude::*;
use crate::data::user::db::problem as user_problem;
use crate::data::user::db::{LoginResponse, UserLoginData, UserSignupData};
use crate::data::user::{User, UserResponse};
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::Problem;
use crate::security::Security;

/// Create a user account
#[utoipa::path(
    request_body = UserSignupData,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid or taken username, or bad password", body = Problem),
    )
)]
#[post("/users/signup", format = "json", data = "<signup>")]
#[tracing::instrument]
pub async fn user_signup(
    signup: Json<UserSignupData>,
    db: &State<Db>,
    security: &State<Security>,
) -> Result<Created<Json<UserResponse>>, Problem> {
    signup.validate()?;
    let signup = signup.into_inner();

    let user = User::new(
        &signup.username,
        security.hash_password(&signup.password),
        signup.role,
    );

    match db.insert_user(&user).await {
        Ok(()) => {}
        Err(StoreError::Duplicate) => return Err(user_problem::username_taken(&user.username)),
        Err(other) => return Err(other.into()),
    }

    let location = format!("/api/users/{}", user.username);
    Ok(Created::new(location).body(Json(UserResponse::from(user))))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    request_body = UserLoginData,
    responses(
        (status = 200, description = "Bearer token and the logged in user", body = LoginResponse),
        (status = 401, description = "Bad username or password", body = Problem),
    )
)]
#[post("/users/login", format = "json", data = "<login>")]
#[tracing::instrument]
pub async fn user_login(
    login: Json<UserLoginData>,
    db: &State<Db>,
    security: &State<Security>,
) -> Result<Json<LoginResponse>, Problem> {
    login.validate()?;

    let user = db
        .find_user_by_username(&login.username)
        .await?
        .ok_or_else(user_problem::bad_login)?;

    if !security.verify_password(&login.password, &user.pw_hash) {
        return Err(user_problem::bad_login());
    }

    let urt = UserRoleToken::new(&user, security.token_lifetime);
    let token = urt.encode_jwt(security.jwt_secret).map_err(|e| {
        tracing::error!("Unable to encode JWT: {}", e);
        Problem::new_untyped(Status::InternalServerError, "Unable to issue a token.")
    })?;

    Ok(Json(LoginResponse {
        token,
        expires: urt.expires(),
        user: user.into(),
    }))
}

/// Get the user the bearer token was issued to
#[utoipa::path(
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or expired token", body = Problem),
        (status = 404, description = "Token holder no longer exists", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/users/me")]
#[tracing::instrument]
pub async fn user_me(auth: UserRoleToken, db: &State<Db>) -> Result<Json<UserResponse>, Problem> {
    db.find_user_by_username(&auth.sub)
        .await?
        .map(|user| Json(user.into()))
        .ok_or_else(|| user_problem::not_found(&auth.sub))
}

/// Get a user's public profile
#[utoipa::path(
    params(
        ("username", description = "username of the user")
    ),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 404, description = "User doesn't exist", body = Problem),
    )
)]
#[get("/users/<username>")]
#[tracing::instrument]
pub async fn user_get(username: &str, db: &State<Db>) -> Result<Json<UserResponse>, Problem> {
    db.find_user_by_username(username)
        .await?
        .map(|user| Json(user.into()))
        .ok_or_else(|| user_problem::not_found(username))
}

#[cfg(test)]
mod user_endpoints {
    use rocket::http::{Header, Status};
    use serde_json::json;

    use crate::role::Role;
    use crate::route::testing::*;

    #[rocket::async_test]
    async fn signup_and_login_work() {
        let client = client().await;
        signup(&client, "teacher_ana", Role::Teacher).await;

        let response = post_json(
            &client,
            "/api/users/login",
            json!({ "username": "teacher_ana", "password": PASSWORD }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);

        let body = body_json(response).await;
        assert_eq!(body["user"]["username"], "teacher_ana");
        assert_eq!(body["user"]["role"], "teacher");
        assert!(body["user"].get("pwHash").is_none());
        let token = body["token"].as_str().expect("token").to_string();

        let response = client
            .get("/api/users/me")
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body_json(response).await["username"], "teacher_ana");
    }

    #[rocket::async_test]
    async fn me_requires_a_valid_token() {
        let client = client().await;

        let response = client.get("/api/users/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(body_json(response).await["detail"], "No bearer token.");

        let response = client
            .get("/api/users/me")
            .header(Header::new("Authorization", "Bearer not.a.token"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn bad_credentials_are_rejected() {
        let client = client().await;
        signup(&client, "student_bo", Role::Student).await;

        let response = post_json(
            &client,
            "/api/users/login",
            json!({ "username": "student_bo", "password": "wrong password" }),
        )
        .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = post_json(
            &client,
            "/api/users/login",
            json!({ "username": "nobody", "password": PASSWORD }),
        )
        .await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(body_json(response).await["title"], "Bad username or password.");
    }

    #[rocket::async_test]
    async fn usernames_are_unique() {
        let client = client().await;
        signup(&client, "student_bo", Role::Student).await;

        let response = post_json(
            &client,
            "/api/users/signup",
            json!({ "username": "student_bo", "password": PASSWORD }),
        )
        .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(body_json(response).await["title"], "Username is already taken.");

        let response = client.get("/api/users/student_bo").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body_json(response).await["role"], "student");

        let response = client.get("/api/users/nobody").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
