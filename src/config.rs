//! Connection settings.
//!
//! Precedence: explicit (CLI) values > environment > config files > defaults.

use crate::errors::DbError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE: &str = "(default)";
pub const DEFAULT_HEALTH_CHECK_COLLECTION: &str = "health_check";
pub const CONFIG_FILE_NAME: &str = "firestore-driver.toml";

/// Resolved settings handed to a [`Connection`](crate::connection::Connection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub project_id: Option<String>,
    pub credentials: Option<PathBuf>,
    pub database: String,
    /// Prepended to every collection name opened through the connection.
    pub prefix: String,
    pub health_check_collection: String,
    /// JSON documents to seed the in-process store with.
    pub fixture: Option<PathBuf>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials: None,
            database: DEFAULT_DATABASE.to_string(),
            prefix: String::new(),
            health_check_collection: DEFAULT_HEALTH_CHECK_COLLECTION.to_string(),
            fixture: None,
        }
    }
}

impl ConnectionConfig {
    /// # Errors
    /// `Config` when the database or health-check collection is blank, or the
    /// credentials file does not exist.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.database.trim().is_empty() {
            return Err(DbError::Config("database name must not be empty".into()));
        }
        if self.health_check_collection.trim().is_empty() {
            return Err(DbError::Config("health_check_collection must not be empty".into()));
        }
        if let Some(p) = &self.credentials
            && !p.exists()
        {
            return Err(DbError::Config(format!("credentials file not found: {}", p.display())));
        }
        Ok(())
    }

    #[must_use]
    pub fn collection_name(&self, table: &str) -> String {
        format!("{}{table}", self.prefix)
    }
}

/// One source of settings; unset fields defer to lower-precedence layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLayer {
    pub project_id: Option<String>,
    pub credentials: Option<PathBuf>,
    pub database: Option<String>,
    pub prefix: Option<String>,
    pub health_check_collection: Option<String>,
    pub fixture: Option<PathBuf>,
}

impl ConfigLayer {
    /// # Errors
    /// `Config` with the parser message when the TOML is malformed.
    pub fn from_toml_str(s: &str) -> Result<Self, DbError> {
        toml::from_str(s).map_err(|e| DbError::Config(e.to_string()))
    }

    /// # Errors
    /// `Io` when the file cannot be read, `Config` when it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| DbError::Config(format!("{}: {e}", path.display())))
    }

    /// Reads `FIRESTORE_*` variables through `lookup`.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        Self {
            project_id: non_empty("FIRESTORE_PROJECT_ID"),
            credentials: non_empty("FIRESTORE_CREDENTIALS")
                .or_else(|| non_empty("GOOGLE_APPLICATION_CREDENTIALS"))
                .map(PathBuf::from),
            database: non_empty("FIRESTORE_DATABASE"),
            prefix: lookup("FIRESTORE_PREFIX"),
            health_check_collection: non_empty("FIRESTORE_HEALTH_CHECK_COLLECTION"),
            fixture: non_empty("FIRESTORE_FIXTURE").map(PathBuf::from),
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Fills every unset field from `lower`.
    pub fn fill_from(&mut self, lower: Self) {
        if self.project_id.is_none() {
            self.project_id = lower.project_id;
        }
        if self.credentials.is_none() {
            self.credentials = lower.credentials;
        }
        if self.database.is_none() {
            self.database = lower.database;
        }
        if self.prefix.is_none() {
            self.prefix = lower.prefix;
        }
        if self.health_check_collection.is_none() {
            self.health_check_collection = lower.health_check_collection;
        }
        if self.fixture.is_none() {
            self.fixture = lower.fixture;
        }
    }

    #[must_use]
    pub fn finish(self) -> ConnectionConfig {
        let d = ConnectionConfig::default();
        ConnectionConfig {
            project_id: self.project_id,
            credentials: self.credentials,
            database: self.database.unwrap_or(d.database),
            prefix: self.prefix.unwrap_or(d.prefix),
            health_check_collection: self
                .health_check_collection
                .unwrap_or(d.health_check_collection),
            fixture: self.fixture,
        }
    }
}

/// Config files consulted, highest precedence first.
#[must_use]
pub fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var("FIRESTORE_DRIVER_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        paths.push(PathBuf::from(home).join(".config").join(CONFIG_FILE_NAME));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE_NAME));
    }
    paths
}

/// Resolves settings from `cli`, the environment and the first config files found.
///
/// # Errors
/// An explicit config path that does not exist, any config file that fails to
/// parse, or a resolved config that fails [`ConnectionConfig::validate`].
pub fn load_config(cli: ConfigLayer, explicit: Option<&Path>) -> Result<ConnectionConfig, DbError> {
    if let Some(p) = explicit
        && !p.exists()
    {
        return Err(DbError::Config(format!("config file not found: {}", p.display())));
    }
    let mut layer = cli;
    layer.fill_from(ConfigLayer::from_env());
    for p in candidate_paths(explicit) {
        if p.is_file() {
            log::debug!("reading config {}", p.display());
            layer.fill_from(ConfigLayer::from_file(&p)?);
        }
    }
    let cfg = layer.finish();
    cfg.validate()?;
    Ok(cfg)
}
