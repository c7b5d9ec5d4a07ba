//! Completion notifications.
//!
//! The engine never talks to a notifier directly. The timer service builds a
//! [`Notification`] for every natural completion and hands it to each
//! registered [`Notifier`]. Notifiers must return quickly: anything slow
//! (audio playback, desktop toasts) belongs on the notifier's own thread.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::timer::{SessionType, TimerSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub session_type: SessionType,
    /// Session that will follow once the completion delay elapses.
    pub next_session_type: SessionType,
    pub show_banner: bool,
    pub play_sound: bool,
    /// 0.0 ..= 1.0, meaningful only when `play_sound` is set.
    pub volume: f64,
}

impl Notification {
    /// Build the notification for a finished session, or `None` when the user
    /// turned off both banners and sound.
    pub fn for_completion(
        session_type: SessionType,
        next_session_type: SessionType,
        settings: &TimerSettings,
    ) -> Option<Self> {
        if !settings.notifications_enabled && !settings.sound_enabled {
            return None;
        }
        Some(Self {
            session_type,
            next_session_type,
            show_banner: settings.notifications_enabled,
            play_sound: settings.sound_enabled,
            volume: settings.sound_volume,
        })
    }

    /// Human readable one-liner, e.g. "Focus finished. Next: Short Break".
    pub fn message(&self) -> String {
        format!(
            "{} finished. Next: {}",
            self.session_type.label(),
            self.next_session_type.label()
        )
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes completions to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        info!(
            session_type = notification.session_type.as_str(),
            sound = notification.play_sound,
            "{}",
            notification.message()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_settings_produce_no_notification() {
        let settings = TimerSettings {
            notifications_enabled: false,
            sound_enabled: false,
            ..Default::default()
        };
        assert!(Notification::for_completion(SessionType::Work, SessionType::ShortBreak, &settings).is_none());
    }

    #[test]
    fn sound_only_notification() {
        let settings = TimerSettings {
            notifications_enabled: false,
            sound_enabled: true,
            sound_volume: 0.8,
            ..Default::default()
        };
        let n = Notification::for_completion(SessionType::LongBreak, SessionType::Work, &settings).unwrap();
        assert!(!n.show_banner);
        assert!(n.play_sound);
        assert_eq!(n.volume, 0.8);
        assert_eq!(n.message(), "Long Break finished. Next: Focus");
    }
}
