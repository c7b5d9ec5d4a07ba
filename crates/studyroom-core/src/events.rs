use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::{CompletedSession, SessionType, TimerSettings, TimerState};

/// Every state change of the timer produces an Event.
/// Hosts print or persist them; notifiers subscribe to completions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        session_id: Option<Uuid>,
        cycle_id: Option<Uuid>,
        session_type: SessionType,
        round: u32,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero on its own.
    SessionCompleted {
        session: CompletedSession,
    },
    /// A new session was set up and is waiting in `Idle`.
    SessionInitialized {
        session_type: SessionType,
        round: u32,
        cycle_id: Option<Uuid>,
        duration_secs: u64,
        auto_start: bool,
        at: DateTime<Utc>,
    },
    TimerSkipped {
        from: SessionType,
        to: SessionType,
        round: u32,
        cycle_id: Option<Uuid>,
        at: DateTime<Utc>,
    },
    TimerReset {
        session_type: SessionType,
        at: DateTime<Utc>,
    },
    SubjectChanged {
        subject_id: Option<String>,
        at: DateTime<Utc>,
    },
    SettingsUpdated {
        settings: TimerSettings,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        next_session_type: SessionType,
        /// 0.0 .. 1.0 within the current session.
        progress: f64,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Snake-case name of the variant, matching the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerPaused { .. } => "timer_paused",
            Event::TimerResumed { .. } => "timer_resumed",
            Event::SessionCompleted { .. } => "session_completed",
            Event::SessionInitialized { .. } => "session_initialized",
            Event::TimerSkipped { .. } => "timer_skipped",
            Event::TimerReset { .. } => "timer_reset",
            Event::SubjectChanged { .. } => "subject_changed",
            Event::SettingsUpdated { .. } => "settings_updated",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }

    /// Whether this event changes something worth persisting as progress.
    pub fn touches_progress(&self) -> bool {
        matches!(
            self,
            Event::SessionCompleted { .. }
                | Event::SessionInitialized { .. }
                | Event::TimerSkipped { .. }
                | Event::TimerStarted { .. }
                | Event::SubjectChanged { .. }
                | Event::SettingsUpdated { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_matches_name() {
        let ev = Event::TimerReset {
            session_type: SessionType::ShortBreak,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], ev.name());
        assert_eq!(json["session_type"], "short_break");
    }
}
