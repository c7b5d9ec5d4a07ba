use studyroom_core::{Config, ConfigStore, CoreError, EngineOptions, SettingsStore, TimerSettings};

pub mod config;
pub mod history;
pub mod subject;
pub mod timer;

/// Timer settings come from the `[timer]` table through the settings store,
/// delays from the `[engine]` table.
pub(crate) fn load_settings() -> Result<(ConfigStore, TimerSettings, EngineOptions), CoreError> {
    let store = ConfigStore::open_default()?;
    let settings = store.load()?;
    let options = Config::load_from(store.path())?.engine_options();
    Ok((store, settings, options))
}
