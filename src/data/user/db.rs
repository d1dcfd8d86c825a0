use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::Database;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{filter, StoreResult};
use crate::resp::problem::Problem;
use crate::role::Role;

use super::{User, UserResponse};

pub static USER_COLLECTION_NAME: &str = "users";

pub mod problem {
    use crate::resp::problem::Problem;
    use crate::role::Role;
    use rocket::http::Status;

    #[inline]
    pub fn bad_username(username: impl ToString, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad username.")
            .insert_str("username", username)
            .detail(detail)
    }

    #[inline]
    pub fn bad_password(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad password.").detail(detail)
    }

    #[inline]
    pub fn username_taken(username: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Username is already taken.")
            .insert_str("username", username)
    }

    #[inline]
    pub fn not_found(username: impl ToString) -> Problem {
        Problem::new_untyped(Status::NotFound, "User doesn't exist.")
            .insert_str("username", username)
    }

    #[inline]
    pub fn bad_login() -> Problem {
        Problem::new_untyped(Status::Unauthorized, "Bad username or password.")
    }

    #[inline]
    pub fn wrong_role(username: impl ToString, expected: Role) -> Problem {
        Problem::new_untyped(Status::BadRequest, format!("User isn't a {}.", expected))
            .insert_str("username", username)
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct UserSignupData {
    pub username: String,
    #[schema(format = Password)]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl std::fmt::Debug for UserSignupData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserSignupInfo:{}:{}", self.username, self.role)
    }
}

#[cfg(feature = "validation-regex")]
fn username_charset_ok(username: &str) -> bool {
    regex::Regex::new(r"^[A-Za-z0-9_.\-]+$")
        .map(|re| re.is_match(username))
        .unwrap_or(false)
}

#[cfg(not(feature = "validation-regex"))]
fn username_charset_ok(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

impl UserSignupData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.username.len() < 3 {
            return Err(problem::bad_username(
                &self.username,
                "Username must be at least 3 characters (bytes) long.",
            ));
        }

        if self.username.len() > 32 {
            return Err(problem::bad_username(
                &self.username,
                "Username can't be longer than 32 (bytes) characters.",
            ));
        }

        if !username_charset_ok(&self.username) {
            return Err(problem::bad_username(
                &self.username,
                "Username may only contain letters, digits, '_', '.' and '-'.",
            ));
        }

        if self.password.len() < 8 {
            return Err(problem::bad_password(
                "Password must be at least 8 characters (bytes) long.",
            ));
        }

        if self.password.len() > 1024 {
            return Err(problem::bad_password(
                "Passwords longer than 1024 characters aren't supported.",
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct UserLoginData {
    pub username: String,
    #[schema(format = Password)]
    pub password: String,
}

impl std::fmt::Debug for UserLoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserLoginInfo:{}", self.username)
    }
}

impl UserLoginData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.username.is_empty()
            || self.username.len() > 32
            || self.password.len() < 8
            || self.password.len() > 1024
        {
            return Err(problem::bad_login());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires: DateTime<Utc>,
    pub user: UserResponse,
}

#[rocket::async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`](crate::data::StoreError) if the
    /// username is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn add_user_course(&self, username: &str, course: Uuid) -> StoreResult<()>;

    async fn remove_course_from_users(&self, course: Uuid) -> StoreResult<u64>;
}

#[rocket::async_trait]
impl UserStore for Database {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.collection::<User>(USER_COLLECTION_NAME)
            .insert_one(user, None)
            .await?;
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .collection::<User>(USER_COLLECTION_NAME)
            .find_one(filter::by_username(username), None)
            .await?)
    }

    async fn add_user_course(&self, username: &str, course: Uuid) -> StoreResult<()> {
        self.collection::<User>(USER_COLLECTION_NAME)
            .update_one(
                filter::by_username(username),
                doc! { "$addToSet": { "courses": filter::uuid(course) } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn remove_course_from_users(&self, course: Uuid) -> StoreResult<u64> {
        let result = self
            .collection::<User>(USER_COLLECTION_NAME)
            .update_many(
                doc! { "courses": filter::uuid(course) },
                doc! { "$pull": { "courses": filter::uuid(course) } },
                None,
            )
            .await?;
        Ok(result.modified_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(username: &str, password: &str) -> UserSignupData {
        UserSignupData {
            username: username.to_string(),
            password: password.to_string(),
            role: Role::Student,
        }
    }

    #[test]
    fn signup_validation() {
        assert!(signup("s1_student", "long enough").validate().is_ok());
        assert!(signup("ab", "long enough").validate().is_err());
        assert!(signup(&"x".repeat(33), "long enough").validate().is_err());
        assert!(signup("has space", "long enough").validate().is_err());
        assert!(signup("s1_student", "short").validate().is_err());
    }

    #[test]
    fn debug_output_hides_passwords() {
        let data = signup("s1_student", "hunter2hunter2");
        assert!(!format!("{:?}", data).contains("hunter2"));

        let login = UserLoginData {
            username: "s1_student".to_string(),
            password: "hunter2hunter2".to_string(),
        };
        assert!(!format!("{:?}", login).contains("hunter2"));
    }
}
