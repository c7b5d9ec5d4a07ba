mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, ConfigStore, EngineConfig};
pub use database::{Database, SessionRecord};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::timer::{TimerProgress, TimerSettings};

/// Where [`TimerSettings`] live between runs.
pub trait SettingsStore {
    fn load(&self) -> Result<TimerSettings>;
    fn save(&self, settings: &TimerSettings) -> Result<()>;
}

/// Where the persisted part of the timer state lives between runs.
pub trait ProgressStore {
    fn load_progress(&self) -> Result<Option<TimerProgress>>;
    fn save_progress(&self, progress: &TimerProgress) -> Result<()>;
}

/// Returns `~/.config/studyroom[-dev]/` based on STUDYROOM_ENV.
///
/// Set STUDYROOM_ENV=dev to use the development data directory, or
/// STUDYROOM_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("STUDYROOM_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("STUDYROOM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("studyroom-dev")
            } else {
                base_dir.join("studyroom")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
