use crate::error::ConfigurationError;
use crate::util;
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("campus".to_string())
}

fn default_store() -> StoreKind {
    match env::var("STORE").as_deref() {
        Ok("memory") => StoreKind::Memory,
        _ => StoreKind::Mongodb,
    }
}

fn default_security_dir() -> PathBuf {
    PathBuf::from(env::var("SECURITY_DIR").unwrap_or("./security".to_string()))
}

#[cfg(debug_assertions)]
fn default_bcrypt_cost() -> u32 {
    8
}
#[cfg(not(debug_assertions))]
fn default_bcrypt_cost() -> u32 {
    12
}

fn default_token_lifetime_hours() -> i64 {
    24 * 7
}

/// Which document store backs the API.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Mongodb,
    /// Process-local collections. Everything is lost on shutdown.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,
    #[serde(default = "default_store")]
    pub store: StoreKind,

    #[serde(default = "default_security_dir")]
    pub security_dir: PathBuf,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default = "default_token_lifetime_hours")]
    pub token_lifetime_hours: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            store: default_store(),
            security_dir: default_security_dir(),
            bcrypt_cost: default_bcrypt_cost(),
            token_lifetime_hours: default_token_lifetime_hours(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        // bcrypt only accepts 2^4..2^31 rounds
        if !(4..32).contains(&self.bcrypt_cost) {
            return Err(ConfigurationError::Invalid {
                field: "bcrypt_cost",
                reason: format!("{} is outside of 4..=31", self.bcrypt_cost),
            });
        }
        if self.token_lifetime_hours <= 0 {
            return Err(ConfigurationError::Invalid {
                field: "token_lifetime_hours",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
