use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use once_cell::sync::Lazy;

static DEFAULT_API_URL: &str = "http://task_management.test/api";
static ENV_API_URL: &str = "TASKDECK_API_URL";
static ENV_DATA_DIR: &str = "TASKDECK_DATA_DIR";
static ENV_TIMEOUT: &str = "TASKDECK_TIMEOUT_SECS";

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("dev", "taskdeck", "taskdeck"));

#[derive(Debug, Clone)]
pub struct AppConfig {
    api_url: String,
    data_dir: PathBuf,
    timeout: Option<Duration>,
}

impl AppConfig {
    /// Construct [`AppConfig`] by resolving the API base URL and data directory from the
    /// provided overrides, environment variables, and platform defaults.
    pub fn discover(api_url_override: Option<String>, data_dir_override: Option<PathBuf>) -> Result<Self> {
        let data_dir = resolve_data_dir(data_dir_override)?;
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).with_context(|| {
                format!("Failed to create data directory at {}", data_dir.display())
            })?;
        }

        let api_url = api_url_override
            .or_else(|| env::var(ENV_API_URL).ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout = match env::var(ENV_TIMEOUT) {
            Ok(raw) => Some(Duration::from_secs(raw.trim().parse::<u64>().with_context(
                || format!("{ENV_TIMEOUT} must be a whole number of seconds, got '{raw}'"),
            )?)),
            Err(_) => None,
        };

        Ok(Self::new(api_url, data_dir).with_timeout(timeout))
    }

    /// Construct [`AppConfig`] directly from resolved values.
    pub fn new(api_url: impl Into<String>, data_dir: PathBuf) -> Self {
        Self {
            api_url: normalize_base_url(api_url.into()),
            data_dir,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Client-side request timeout. `None` leaves it to the HTTP client's defaults.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

fn normalize_base_url(raw: String) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn resolve_data_dir(data_dir_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = data_dir_override {
        return Ok(dir);
    }

    if let Ok(env_dir) = env::var(ENV_DATA_DIR) {
        return Ok(PathBuf::from(env_dir));
    }

    if let Some(project) = &*PROJECT_DIRS {
        return Ok(project.data_dir().to_path_buf());
    }

    if let Some(base) = BaseDirs::new() {
        return Ok(base.home_dir().join(".taskdeck"));
    }

    Ok(env::current_dir()?.join(".taskdeck"))
}
