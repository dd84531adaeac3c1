//! Application settings
//!
//! Settings live in a plain JSON file (default `data/config.json`). Values from
//! the environment (or a `.env` file) take precedence over the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::{SharedError, SharedResult};

pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 10;

pub const DEFAULT_BASE_URL: &str = "https://api.xiaomimimo.com/v1";
pub const DEFAULT_MODEL: &str = "mimo-v2-flash";

pub const ENV_API_KEY: &str = "ARTICLES_API_KEY";
pub const ENV_BASE_URL: &str = "ARTICLES_BASE_URL";
pub const ENV_MODEL: &str = "ARTICLES_MODEL";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub rate_limit_per_minute: u32,
    pub max_workers: usize,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            rate_limit_per_minute: 100,
            max_workers: 3,
            request_timeout_secs: 300,
        }
    }
}

impl Settings {
    /// Read settings from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> SharedResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load `.env`, read the file, then apply environment overrides
    pub fn load_with_env(path: &Path) -> SharedResult<Self> {
        let _ = dotenvy::dotenv();
        let mut settings = Self::load(path)?;
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            self.model = model;
        }
    }

    /// Write settings as pretty JSON, replacing the file in one rename
    pub fn save(&self, path: &Path) -> SharedResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn validate(&self) -> SharedResult<()> {
        validate_worker_limit(self.max_workers as i64)?;
        if self.rate_limit_per_minute == 0 {
            return Err(SharedError::invalid_config("rate_limit_per_minute", 0));
        }
        if self.base_url.trim().is_empty() {
            return Err(SharedError::invalid_config("base_url", "<empty>"));
        }
        Ok(())
    }

    /// Base URL with surrounding whitespace and stray backticks removed
    pub fn clean_base_url(&self) -> String {
        self.base_url.trim().trim_matches('`').trim().trim_end_matches('/').to_string()
    }
}

/// Accept a worker count only inside `[MIN_WORKERS, MAX_WORKERS]`
pub fn validate_worker_limit(workers: i64) -> SharedResult<usize> {
    if workers < MIN_WORKERS as i64 || workers > MAX_WORKERS as i64 {
        return Err(SharedError::invalid_config("max_workers", workers));
    }
    Ok(workers as usize)
}
