//! TOML-based application configuration.
//!
//! Stores user preferences:
//! - `[timer]`: durations, rounds per cycle, auto-start, sound and notification flags
//! - `[engine]`: the completion and auto-start delays
//!
//! Configuration is stored at `~/.config/studyroom/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{data_dir, SettingsStore};
use crate::error::{ConfigError, Result};
use crate::timer::{EngineOptions, TimerSettings};

/// Delays between automatic transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_completion_delay_ms")]
    pub completion_delay_ms: u64,
    #[serde(default = "default_auto_start_delay_ms")]
    pub auto_start_delay_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studyroom/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerSettings,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_completion_delay_ms() -> u64 {
    2000
}
fn default_auto_start_delay_ms() -> u64 {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            completion_delay_ms: default_completion_delay_ms(),
            auto_start_delay_ms: default_auto_start_delay_ms(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot replace a whole table".to_string()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default config file location.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or holds invalid
    /// timer settings.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.timer.validate().map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, writing defaults");
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Persist to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// The config is left unchanged when the key is unknown, the value
    /// cannot be parsed, or the resulting timer settings are invalid.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKey`] or [`ConfigError::InvalidValue`].
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let next: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        next.timer.validate().map_err(|e| invalid(e.to_string()))?;
        *self = next;
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            completion_delay: Duration::from_millis(self.engine.completion_delay_ms),
            auto_start_delay: Duration::from_millis(self.engine.auto_start_delay_ms),
        }
    }
}

/// [`SettingsStore`] backed by the `[timer]` table of a config file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default config location.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Config::path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for ConfigStore {
    fn load(&self) -> Result<TimerSettings> {
        Ok(Config::load_from(&self.path)?.timer)
    }

    fn save(&self, settings: &TimerSettings) -> Result<()> {
        settings.validate()?;
        let mut cfg = Config::load_from(&self.path)?;
        cfg.timer = settings.clone();
        cfg.save_to(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[timer]\nwork_duration = 50\n").unwrap();
        assert_eq!(parsed.timer.work_duration, 50);
        assert_eq!(parsed.timer.short_break_duration, 5);
        assert_eq!(parsed.engine.completion_delay_ms, 2000);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.work_duration").as_deref(), Some("25"));
        assert_eq!(cfg.get("timer.auto_start_breaks").as_deref(), Some("false"));
        assert_eq!(cfg.get("engine.auto_start_delay_ms").as_deref(), Some("1000"));
        assert!(cfg.get("timer.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("timer.work_duration", "45").unwrap();
        cfg.set("timer.auto_start_sessions", "true").unwrap();
        cfg.set("timer.sound_volume", "0.8").unwrap();
        assert_eq!(cfg.timer.work_duration, 45);
        assert!(cfg.timer.auto_start_sessions);
        assert_eq!(cfg.timer.sound_volume, 0.8);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nonexistent_key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("timer.sound_enabled", "not_a_bool").is_err());
        assert!(cfg.set("timer", "1").is_err());
    }

    #[test]
    fn set_rejects_invalid_settings_without_mutating() {
        let mut cfg = Config::default();
        assert!(cfg.set("timer.work_duration", "-5").is_err());
        assert!(cfg.set("timer.work_duration", "0").is_err());
        assert!(cfg.set("timer.sessions_until_long_break", "0").is_err());
        assert!(cfg.set("timer.sound_volume", "2").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn engine_options_follow_config() {
        let mut cfg = Config::default();
        cfg.set("engine.completion_delay_ms", "500").unwrap();
        let opts = cfg.engine_options();
        assert_eq!(opts.completion_delay, Duration::from_millis(500));
        assert_eq!(opts.auto_start_delay, Duration::from_millis(1000));
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn load_from_rejects_invalid_timer_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timer]\nsessions_until_long_break = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn config_store_saves_only_timer_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.engine.completion_delay_ms = 10;
        cfg.save_to(&path).unwrap();

        let store = ConfigStore::new(&path);
        let mut settings = store.load().unwrap();
        settings.long_break_duration = 20;
        store.save(&settings).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.timer.long_break_duration, 20);
        assert_eq!(reloaded.engine.completion_delay_ms, 10);
    }

    #[test]
    fn config_store_refuses_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.toml"));
        let bad = TimerSettings {
            work_duration: 0,
            ..Default::default()
        };
        assert!(store.save(&bad).is_err());
    }
}
