use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub fn is_break(self) -> bool {
        !matches!(self, SessionType::Work)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Work => "work",
            SessionType::ShortBreak => "short_break",
            SessionType::LongBreak => "long_break",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionType::Work => "Focus",
            SessionType::ShortBreak => "Short Break",
            SessionType::LongBreak => "Long Break",
        }
    }

    /// Inverse of [`SessionType::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "work" => Some(SessionType::Work),
            "short_break" => Some(SessionType::ShortBreak),
            "long_break" => Some(SessionType::LongBreak),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    /// Countdown hit zero; the engine leaves this on its own once the
    /// completion delay elapses.
    Completed,
}

/// Observable state of the timer.
///
/// Hosts read this; only [`TimerEngine`](super::TimerEngine) writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerState {
    pub current_session_type: SessionType,
    pub current_session_id: Option<Uuid>,
    pub subject_id: Option<String>,
    /// Seconds left in the current session.
    pub time_remaining: u64,
    /// Seconds the current session was initialized with.
    pub total_time: u64,
    pub status: TimerStatus,
    /// Position of the current (or upcoming) work session within the cycle, 1-based.
    pub current_round: u32,
    pub cycle_id: Option<Uuid>,
    pub completed_sessions: u64,
    /// When the current session left `Idle`.
    pub started_at: Option<DateTime<Utc>>,
}

impl TimerState {
    /// The persisted subset of this state.
    pub fn progress(&self) -> TimerProgress {
        TimerProgress {
            current_round: self.current_round,
            cycle_id: self.cycle_id,
            completed_sessions: self.completed_sessions,
            subject_id: self.subject_id.clone(),
        }
    }
}

/// The part of [`TimerState`] that survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerProgress {
    pub current_round: u32,
    #[serde(default)]
    pub cycle_id: Option<Uuid>,
    #[serde(default)]
    pub completed_sessions: u64,
    #[serde(default)]
    pub subject_id: Option<String>,
}

impl Default for TimerProgress {
    fn default() -> Self {
        Self {
            current_round: 1,
            cycle_id: None,
            completed_sessions: 0,
            subject_id: None,
        }
    }
}

/// Everything a host needs to persist a naturally completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub session_id: Option<Uuid>,
    pub cycle_id: Option<Uuid>,
    pub session_type: SessionType,
    pub round: u32,
    pub subject_id: Option<String>,
    pub duration_secs: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_type_string_forms_match_serde() {
        for t in [SessionType::Work, SessionType::ShortBreak, SessionType::LongBreak] {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(SessionType::parse(t.as_str()), Some(t));
        }
        assert_eq!(SessionType::parse("nap"), None);
    }

    #[test]
    fn only_work_is_not_a_break() {
        assert!(!SessionType::Work.is_break());
        assert!(SessionType::ShortBreak.is_break());
        assert!(SessionType::LongBreak.is_break());
    }

    #[test]
    fn progress_defaults_missing_fields() {
        let p: TimerProgress = serde_json::from_str(r#"{"current_round": 3}"#).unwrap();
        assert_eq!(p.current_round, 3);
        assert_eq!(p.completed_sessions, 0);
        assert!(p.cycle_id.is_none());
    }
}
