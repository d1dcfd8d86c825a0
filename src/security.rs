use base64::Engine;
use chrono::Duration;
use crypto::bcrypt::bcrypt;
use sha2::{Digest, Sha256};
use std::convert::TryInto;
use std::fs;
use std::path::Path;

use crate::data::user::PasswordHash;
use crate::error::BackendError;
use crate::util::base64_engine;

const PASSWORD_SALT: &str = "password.salt";
const JWT_SECRET: &str = "jwt.secret";

pub type Salt = [u8; 16];
pub type Secret = [u8; 32];

/// Password salt, token signing secret and hashing parameters shared by all
/// request handlers.
#[derive(Clone)]
pub struct Security {
    pub salt: Salt,
    pub jwt_secret: Secret,
    pub bcrypt_cost: u32,
    pub token_lifetime: Duration,
}

impl std::fmt::Debug for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Security")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("token_lifetime", &self.token_lifetime)
            .finish_non_exhaustive()
    }
}

impl Security {
    /// Loads security material from `dir`, generating whatever is missing.
    pub fn load(
        dir: impl AsRef<Path>,
        bcrypt_cost: u32,
        token_lifetime: Duration,
    ) -> Result<Security, BackendError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        tracing::info!("Loading password salt...");
        let salt: Salt = load_or_generate(&dir.join(PASSWORD_SALT), rand::random)?;
        tracing::info!("Loading JWT signing secret...");
        let jwt_secret: Secret = load_or_generate(&dir.join(JWT_SECRET), rand::random)?;

        Ok(Security {
            salt,
            jwt_secret,
            bcrypt_cost,
            token_lifetime,
        })
    }

    /// Fresh random material that is never persisted.
    pub fn ephemeral(bcrypt_cost: u32, token_lifetime: Duration) -> Security {
        Security {
            salt: rand::random(),
            jwt_secret: rand::random(),
            bcrypt_cost,
            token_lifetime,
        }
    }

    pub fn hash_password(&self, password: impl AsRef<str>) -> PasswordHash {
        let mut pw_hash: [u8; 24] = [0; 24];

        // bcrypt input is capped at 72 bytes, digest keeps long passwords distinct
        let mut sha = Sha256::new();
        sha2::Digest::update(&mut sha, password.as_ref().as_bytes());

        bcrypt(
            self.bcrypt_cost,
            &self.salt,
            sha.finalize().as_slice(),
            &mut pw_hash,
        );

        PasswordHash(pw_hash)
    }

    pub fn verify_password(&self, password: impl AsRef<str>, expected: &PasswordHash) -> bool {
        &self.hash_password(password) == expected
    }
}

fn load_or_generate<const N: usize>(
    path: &Path,
    generate: impl FnOnce() -> [u8; N],
) -> Result<[u8; N], BackendError> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let bytes = base64_engine().decode(text.trim())?;
            bytes
                .try_into()
                .map_err(|_| BackendError::Security(path.to_path_buf()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("'{}' not found. Generating a new one.", path.display());
            let value = generate();
            fs::write(path, base64_engine().encode(value))?;
            Ok(value)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_verification() {
        let security = Security::ephemeral(4, Duration::hours(1));
        let hash = security.hash_password("correct horse battery");

        assert!(security.verify_password("correct horse battery", &hash));
        assert!(!security.verify_password("correct horse battery staple", &hash));
    }

    #[test]
    fn material_is_persisted_between_loads() {
        let dir = std::env::temp_dir().join(format!("campus-security-{}", uuid::Uuid::new_v4()));

        let first = Security::load(&dir, 4, Duration::hours(1)).expect("generated");
        let second = Security::load(&dir, 4, Duration::hours(1)).expect("loaded");
        assert_eq!(first.salt, second.salt);
        assert_eq!(first.jwt_secret, second.jwt_secret);

        fs::write(dir.join(PASSWORD_SALT), "AAAA").expect("writable");
        assert!(matches!(
            Security::load(&dir, 4, Duration::hours(1)),
            Err(BackendError::Security(_))
        ));

        let _ = fs::remove_dir_all(dir);
    }
}
