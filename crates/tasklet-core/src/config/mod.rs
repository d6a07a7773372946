//! Runtime configuration for Tasklet front ends.
//!
//! Settings come from an optional JSON file and are then overridden by
//! environment variables. Every field has a default, so a missing file is the
//! same as an empty one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::{FlagCommit, ImportMode, SyncOptions, DEFAULT_TODOS_URL};
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const CONFIG_FILE_NAME: &str = "config.json";
const DATABASE_FILE_NAME: &str = "tasks.db";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

pub const CONFIG_PATH_ENV: &str = "TASKLET_CONFIG";
pub const DB_PATH_ENV: &str = "TASKLET_DB_PATH";
pub const TODOS_URL_ENV: &str = "TASKLET_TODOS_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Task database file; the platform data directory when unset
    pub database_path: Option<PathBuf>,
    /// Endpoint of the first-launch import
    pub todos_url: Option<String>,
    pub http_timeout_secs: u64,
    pub flag_commit: FlagCommit,
    pub import_mode: ImportMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            todos_url: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            flag_commit: FlagCommit::default(),
            import_mode: ImportMode::default(),
        }
    }
}

impl AppConfig {
    /// Load the config file at `explicit`, `$TASKLET_CONFIG` or the default
    /// location, then apply environment overrides.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| normalize_text_option(env(CONFIG_PATH_ENV)).map(PathBuf::from))
            .or_else(default_config_path);

        let config = match path {
            Some(path) => Self::load_from_path(&path)?,
            None => Self::default(),
        };
        config.with_overrides(env)
    }

    /// Read a config file; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str::<Self>(&raw).inspect_err(|error| {
            tracing::warn!("Failed to parse config at {}: {}", path.display(), error);
        })?;
        config.normalized()
    }

    /// Apply `TASKLET_DB_PATH` and `TASKLET_TODOS_URL` as read by `env`.
    pub fn with_overrides(mut self, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = normalize_text_option(env(DB_PATH_ENV)) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(url) = normalize_text_option(env(TODOS_URL_ENV)) {
            self.todos_url = Some(url);
        }
        self.normalized()
    }

    fn normalized(mut self) -> Result<Self> {
        self.todos_url = normalize_text_option(self.todos_url.take());
        if let Some(url) = &self.todos_url {
            if !is_http_url(url) {
                return Err(Error::Config(format!(
                    "todos_url must include http:// or https:// (got {url:?})"
                )));
            }
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::Config(
                "http_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    /// Configured database path, falling back to the platform data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        self.database_path
            .clone()
            .or_else(default_db_path)
            .ok_or_else(|| Error::Config("Failed to resolve a data directory".to_string()))
    }

    pub fn todos_url(&self) -> &str {
        self.todos_url.as_deref().unwrap_or(DEFAULT_TODOS_URL)
    }

    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub const fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            flag_commit: self.flag_commit,
            import_mode: self.import_mode,
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tasklet").join(CONFIG_FILE_NAME))
}

pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("tasklet").join(DATABASE_FILE_NAME))
}
