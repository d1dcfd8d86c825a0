use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::Status;
use rocket::outcome::Outcome::{Error, Success};
use rocket::request::{self, FromRequest, Request};
use serde::{Deserialize, Serialize};

use crate::data::user::User;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::security::Security;

pub static AUTH_HEADER_NAME: &str = "Authorization";
static BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRoleToken {
    #[serde(with = "chrono::serde::ts_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    exp: DateTime<Utc>,
    /// Username of the token holder.
    pub sub: String,
    pub role: Role,
}

impl UserRoleToken {
    pub fn new(user: &User, lifetime: Duration) -> UserRoleToken {
        let now = Utc::now();
        UserRoleToken {
            iat: now,
            exp: now + lifetime,
            sub: user.username.clone(),
            role: user.role,
        }
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.exp
    }

    pub fn encode_jwt(&self, secret: impl AsRef<[u8]>) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, &self, &EncodingKey::from_secret(secret.as_ref()))
    }

    pub fn decode_jwt(token: &str, secret: impl AsRef<[u8]>) -> Result<UserRoleToken, Problem> {
        decode::<UserRoleToken>(
            token,
            &DecodingKey::from_secret(secret.as_ref()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(Problem::from)
    }
}

pub fn auth_problem(detail: impl ToString) -> Problem {
    Problem::new_untyped(Status::Unauthorized, "Unable to authorize user.").detail(detail)
}

pub fn extract_claims(
    authorization: Option<&str>,
    secret: impl AsRef<[u8]>,
) -> Result<UserRoleToken, Problem> {
    let token = match authorization.and_then(|it| it.strip_prefix(BEARER_PREFIX)) {
        Some(token) => token.trim(),
        None => return Err(auth_problem("No bearer token.")),
    };
    tracing::debug!("extracted jwt from authorization header");

    let claims = UserRoleToken::decode_jwt(token, secret)
        .map_err(|p| auth_problem(p.title))?;
    tracing::debug!("decoded user roles token for user: {}", claims.sub);

    Ok(claims)
}

/// Reason the last request guard rejected a request, read back by catchers.
#[derive(Debug, Default)]
pub struct GuardFailure(pub Option<Problem>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserRoleToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let security = match req.rocket().state::<Security>() {
            Some(it) => it,
            None => {
                let problem =
                    Problem::new_untyped(Status::InternalServerError, "Security not configured.");
                return Error((Status::InternalServerError, problem));
            }
        };

        tracing::trace!("extracting user roles token from request headers");
        match extract_claims(req.headers().get_one(AUTH_HEADER_NAME), security.jwt_secret) {
            Ok(claims) => Success(claims),
            Err(e) => {
                tracing::debug!("unable to extract claims from request");
                let _ = req.local_cache(|| GuardFailure(Some(e.clone())));
                Error((Status::Unauthorized, e))
            }
        }
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl From<JWTAuth> for SecurityScheme {
        fn from(_: JWTAuth) -> Self {
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            )
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(c) = openapi.components.as_mut() {
                c.add_security_scheme("jwt", *self)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SubsecRound;

    #[test]
    fn jwt_configured_properly() {
        let now = Utc::now().round_subsecs(0);

        let urt = UserRoleToken {
            iat: now,
            exp: now + Duration::weeks(1),
            sub: "teacher_ana".to_string(),
            role: Role::Teacher,
        };

        let security = Security::ephemeral(4, Duration::weeks(1));
        let token = urt
            .encode_jwt(security.jwt_secret)
            .expect("encoding should work for example");

        let header = format!("Bearer {}", token);
        let decoded = extract_claims(Some(&header), security.jwt_secret)
            .expect("unable to decode encoded token");

        assert_eq!(decoded, urt);
    }

    #[test]
    fn foreign_and_missing_tokens_are_rejected() {
        let now = Utc::now();
        let urt = UserRoleToken {
            iat: now,
            exp: now + Duration::hours(1),
            sub: "student_bo".to_string(),
            role: Role::Student,
        };
        let token = urt.encode_jwt([7u8; 32]).expect("encodable");
        let header = format!("Bearer {}", token);

        assert!(extract_claims(Some(&header), [8u8; 32]).is_err());
        assert!(extract_claims(Some(&token), [7u8; 32]).is_err());
        assert!(extract_claims(None, [7u8; 32]).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let issued = Utc::now() - Duration::days(2);
        let urt = UserRoleToken {
            iat: issued,
            exp: issued + Duration::days(1),
            sub: "student_bo".to_string(),
            role: Role::Student,
        };
        let token = urt.encode_jwt([1u8; 32]).expect("encodable");
        let header = format!("Bearer {}", token);

        let problem = extract_claims(Some(&header), [1u8; 32]).expect_err("expired");
        assert_eq!(problem.status, Status::Unauthorized);
    }
}
