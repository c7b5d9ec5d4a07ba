//! Timer settings and validated partial updates.

use serde::{Deserialize, Serialize};

use super::session::SessionType;
use crate::error::ValidationError;

/// Longest accepted duration for any session, in minutes.
pub const MAX_DURATION_MIN: u32 = 24 * 60;

/// User-facing timer configuration.
///
/// Durations are in minutes. Values held here are always valid: construction
/// from untrusted input goes through [`TimerSettings::validate`] or
/// [`TimerSettings::merged`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    pub work_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
    /// Number of work rounds before a long break is inserted.
    pub sessions_until_long_break: u32,
    pub auto_start_breaks: bool,
    pub auto_start_sessions: bool,
    pub sound_enabled: bool,
    /// 0.0 ..= 1.0
    pub sound_volume: f64,
    pub notifications_enabled: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
            sessions_until_long_break: 4,
            auto_start_breaks: false,
            auto_start_sessions: false,
            sound_enabled: true,
            sound_volume: 0.5,
            notifications_enabled: true,
        }
    }
}

/// A partial settings update.
///
/// Numeric fields are wider than their stored counterparts so
/// that form or CLI input like `-5` reaches validation instead of failing
/// somewhere upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub work_duration: Option<i64>,
    pub short_break_duration: Option<i64>,
    pub long_break_duration: Option<i64>,
    pub sessions_until_long_break: Option<i64>,
    pub auto_start_breaks: Option<bool>,
    pub auto_start_sessions: Option<bool>,
    pub sound_enabled: Option<bool>,
    pub sound_volume: Option<f64>,
    pub notifications_enabled: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }
}

impl TimerSettings {
    /// Configured duration for `session_type`, in seconds.
    pub fn duration_secs(&self, session_type: SessionType) -> u64 {
        let minutes = match session_type {
            SessionType::Work => self.work_duration,
            SessionType::ShortBreak => self.short_break_duration,
            SessionType::LongBreak => self.long_break_duration,
        };
        u64::from(minutes).saturating_mul(60)
    }

    /// Whether a freshly initialized session of `session_type` starts on its own.
    pub fn auto_starts(&self, session_type: SessionType) -> bool {
        if session_type.is_break() {
            self.auto_start_breaks
        } else {
            self.auto_start_sessions
        }
    }

    /// Check every invariant on an already-typed settings value.
    ///
    /// # Errors
    /// Returns the first field that is out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_minutes("work_duration", i64::from(self.work_duration))?;
        check_minutes("short_break_duration", i64::from(self.short_break_duration))?;
        check_minutes("long_break_duration", i64::from(self.long_break_duration))?;
        check_rounds(i64::from(self.sessions_until_long_break))?;
        check_volume(self.sound_volume)?;
        Ok(())
    }

    /// Apply `patch` on top of `self`, returning the merged settings.
    ///
    /// `self` is never modified; callers swap the result in only on success.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] naming the first rejected field.
    pub fn merged(&self, patch: &SettingsPatch) -> Result<TimerSettings, ValidationError> {
        let mut next = self.clone();
        if let Some(v) = patch.work_duration {
            next.work_duration = check_minutes("work_duration", v)?;
        }
        if let Some(v) = patch.short_break_duration {
            next.short_break_duration = check_minutes("short_break_duration", v)?;
        }
        if let Some(v) = patch.long_break_duration {
            next.long_break_duration = check_minutes("long_break_duration", v)?;
        }
        if let Some(v) = patch.sessions_until_long_break {
            next.sessions_until_long_break = check_rounds(v)?;
        }
        if let Some(v) = patch.sound_volume {
            next.sound_volume = check_volume(v)?;
        }
        if let Some(v) = patch.auto_start_breaks {
            next.auto_start_breaks = v;
        }
        if let Some(v) = patch.auto_start_sessions {
            next.auto_start_sessions = v;
        }
        if let Some(v) = patch.sound_enabled {
            next.sound_enabled = v;
        }
        if let Some(v) = patch.notifications_enabled {
            next.notifications_enabled = v;
        }
        next.validate()?;
        Ok(next)
    }
}

fn check_minutes(field: &str, value: i64) -> Result<u32, ValidationError> {
    if value < 1 {
        return Err(ValidationError::invalid(field, format!("{value} must be at least 1 minute")));
    }
    if value > i64::from(MAX_DURATION_MIN) {
        return Err(ValidationError::invalid(
            field,
            format!("{value} exceeds the maximum of {MAX_DURATION_MIN} minutes"),
        ));
    }
    u32::try_from(value).map_err(|_| ValidationError::invalid(field, "out of range"))
}

fn check_rounds(value: i64) -> Result<u32, ValidationError> {
    if value < 1 {
        return Err(ValidationError::invalid(
            "sessions_until_long_break",
            format!("{value} must be at least 1"),
        ));
    }
    u32::try_from(value).map_err(|_| ValidationError::invalid("sessions_until_long_break", "out of range"))
}

fn check_volume(value: f64) -> Result<f64, ValidationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::invalid(
            "sound_volume",
            format!("{value} must be between 0.0 and 1.0"),
        ));
    }
    Ok(value)
}
