use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::role::Role;

pub mod db;

#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PasswordHash(pub(crate) [u8; 24]);

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PasswordHash(..)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub username: String,
    pub pw_hash: PasswordHash,
    pub role: Role,
    /// Courses the user is registered in.
    #[serde(default, with = "crate::util::uuid_vec_as_binary")]
    pub courses: Vec<Uuid>,
    #[serde(default = "bson::DateTime::now")]
    pub created: bson::DateTime,
}

impl User {
    pub fn new(username: impl ToString, pw_hash: PasswordHash, role: Role) -> User {
        let username = username.to_string();
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, username.as_bytes());
        tracing::info!("Creating a new {} with UUID: {}", role, id);

        User {
            id,
            username,
            pw_hash,
            role,
            courses: vec![],
            created: bson::DateTime::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub courses: Vec<Uuid>,
    pub created: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            role: user.role,
            courses: user.courses,
            created: user.created.to_chrono(),
        }
    }
}
