//! Timer engine implementation.
//!
//! The engine is a tick-driven state machine. It does not use internal
//! threads: the caller invokes `tick()` once per elapsed second while the
//! timer is running, and delivers deferred jobs back through `fire()`.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |
//!           v
//!       Completed -(completion delay)-> Idle (next session) -(auto-start)-> Running
//! ```
//!
//! ## Session sequence
//!
//! ```text
//! Work(1) -> ShortBreak -> Work(2) -> ... -> Work(N) -> LongBreak -> Work(1, new cycle)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(settings, EngineOptions::default(), ManualScheduler::new());
//! engine.start();
//! // Once per second while running:
//! engine.tick(); // Returns Some(Event::SessionCompleted) when the countdown ends
//! ```

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::scheduler::{DeferredJob, DeferredKind, EngineOptions, ManualScheduler, Scheduler};
use super::session::{CompletedSession, SessionType, TimerProgress, TimerState, TimerStatus};
use super::settings::{SettingsPatch, TimerSettings};
use crate::error::ValidationError;
use crate::events::Event;

/// Core timer engine.
///
/// Every mutation goes through one of the command methods below. Commands
/// whose precondition does not hold are no-ops and return `None`.
#[derive(Debug)]
pub struct TimerEngine<S: Scheduler = ManualScheduler> {
    settings: TimerSettings,
    state: TimerState,
    options: EngineOptions,
    scheduler: S,
    /// The single outstanding deferred job, if any.
    pending: Option<DeferredJob>,
    next_token: u64,
}

impl<S: Scheduler> TimerEngine<S> {
    /// Create a fresh engine: `Idle`, `Work`, round 1, no cycle yet.
    pub fn new(settings: TimerSettings, options: EngineOptions, scheduler: S) -> Self {
        debug_assert!(settings.validate().is_ok(), "engine built with invalid settings");
        let total = settings.duration_secs(SessionType::Work);
        Self {
            settings,
            state: TimerState {
                current_session_type: SessionType::Work,
                current_session_id: None,
                subject_id: None,
                time_remaining: total,
                total_time: total,
                status: TimerStatus::Idle,
                current_round: 1,
                cycle_id: None,
                completed_sessions: 0,
                started_at: None,
            },
            options,
            scheduler,
            pending: None,
            next_token: 0,
        }
    }

    /// Rebuild an engine from persisted progress.
    ///
    /// The round is clamped into `1..=sessions_until_long_break` in case the
    /// settings changed while the progress was on disk.
    pub fn restore(
        settings: TimerSettings,
        progress: TimerProgress,
        options: EngineOptions,
        scheduler: S,
    ) -> Self {
        let mut engine = Self::new(settings, options, scheduler);
        engine.state.current_round = progress.current_round;
        engine.state.cycle_id = progress.cycle_id;
        engine.state.completed_sessions = progress.completed_sessions;
        engine.state.subject_id = progress.subject_id;
        engine.enforce_invariants();
        engine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn pending_job(&self) -> Option<DeferredJob> {
        self.pending
    }

    /// The session type that follows the current one.
    pub fn next_session_type(&self) -> SessionType {
        match self.state.current_session_type {
            SessionType::Work => {
                if self.state.current_round >= self.settings.sessions_until_long_break {
                    SessionType::LongBreak
                } else {
                    SessionType::ShortBreak
                }
            }
            SessionType::ShortBreak | SessionType::LongBreak => SessionType::Work,
        }
    }

    /// 0.0 .. 1.0 progress within the current session.
    pub fn progress(&self) -> f64 {
        if self.state.total_time == 0 {
            return 0.0;
        }
        1.0 - (self.state.time_remaining as f64 / self.state.total_time as f64)
    }

    /// The subset of state that should survive a restart.
    pub fn progress_state(&self) -> TimerProgress {
        self.state.progress()
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state.clone(),
            next_session_type: self.next_session_type(),
            progress: self.progress(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        match self.state.status {
            TimerStatus::Idle => {
                // A manual start supersedes a pending auto-start.
                self.cancel_pending();
                let session_id = Uuid::new_v4();
                self.state.current_session_id = Some(session_id);
                self.state.started_at = Some(Utc::now());
                if self.state.cycle_id.is_none() {
                    self.state.cycle_id = Some(Uuid::new_v4());
                }
                self.state.status = TimerStatus::Running;
                debug!(
                    %session_id,
                    session_type = self.state.current_session_type.as_str(),
                    round = self.state.current_round,
                    "session started"
                );
                Some(Event::TimerStarted {
                    session_id: self.state.current_session_id,
                    cycle_id: self.state.cycle_id,
                    session_type: self.state.current_session_type,
                    round: self.state.current_round,
                    duration_secs: self.state.total_time,
                    at: Utc::now(),
                })
            }
            TimerStatus::Paused => {
                self.state.status = TimerStatus::Running;
                debug!(remaining = self.state.time_remaining, "session resumed");
                Some(Event::TimerResumed {
                    remaining_secs: self.state.time_remaining,
                    at: Utc::now(),
                })
            }
            TimerStatus::Running | TimerStatus::Completed => None,
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.state.status != TimerStatus::Running {
            return None;
        }
        self.state.status = TimerStatus::Paused;
        debug!(remaining = self.state.time_remaining, "session paused");
        Some(Event::TimerPaused {
            remaining_secs: self.state.time_remaining,
            at: Utc::now(),
        })
    }

    /// Back to `Idle` with a full countdown for the current session type.
    /// Round, cycle and completed counter are left alone.
    pub fn reset(&mut self) -> Option<Event> {
        self.cancel_pending();
        let total = self.settings.duration_secs(self.state.current_session_type);
        self.state.total_time = total;
        self.state.time_remaining = total;
        self.state.status = TimerStatus::Idle;
        self.state.current_session_id = None;
        self.state.started_at = None;
        self.enforce_invariants();
        debug!(session_type = self.state.current_session_type.as_str(), "timer reset");
        Some(Event::TimerReset {
            session_type: self.state.current_session_type,
            at: Utc::now(),
        })
    }

    /// One elapsed second. Returns `Some(Event::SessionCompleted)` when the
    /// countdown reaches zero.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state.status != TimerStatus::Running {
            return None;
        }
        if self.state.time_remaining <= 1 {
            return Some(self.complete_session());
        }
        self.state.time_remaining -= 1;
        None
    }

    /// Move to the next session immediately. Never counts as a completion.
    pub fn skip(&mut self) -> Option<Event> {
        self.cancel_pending();
        let from = self.state.current_session_type;
        let to = self.next_session_type();
        self.initialize_session(to);
        debug!(from = from.as_str(), to = to.as_str(), "session skipped");
        Some(Event::TimerSkipped {
            from,
            to,
            round: self.state.current_round,
            cycle_id: self.state.cycle_id,
            at: Utc::now(),
        })
    }

    pub fn set_subject(&mut self, subject_id: Option<String>) -> Option<Event> {
        if self.state.subject_id == subject_id {
            return None;
        }
        self.state.subject_id = subject_id;
        Some(Event::SubjectChanged {
            subject_id: self.state.subject_id.clone(),
            at: Utc::now(),
        })
    }

    /// Merge `patch` into the settings.
    ///
    /// While idle the countdown is recomputed right away; otherwise the
    /// running session keeps its duration and the change applies from the
    /// next session on.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] and leaves the engine untouched when the
    /// merged settings are invalid.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<Option<Event>, ValidationError> {
        let merged = self.settings.merged(patch).inspect_err(|e| {
            warn!(error = %e, "settings update rejected");
        })?;
        self.settings = merged;

        if self.state.current_round > self.settings.sessions_until_long_break {
            self.state.current_round = self.settings.sessions_until_long_break;
        }
        if self.state.status == TimerStatus::Idle {
            let total = self.settings.duration_secs(self.state.current_session_type);
            self.state.total_time = total;
            self.state.time_remaining = total;
        }
        if let Some(job) = self.pending {
            if job.kind == DeferredKind::AutoStart
                && !self.settings.auto_starts(self.state.current_session_type)
            {
                self.cancel_pending();
            }
        }
        self.enforce_invariants();
        debug!("settings updated");
        Ok(Some(Event::SettingsUpdated {
            settings: self.settings.clone(),
            at: Utc::now(),
        }))
    }

    /// Deliver a job previously handed to the scheduler.
    ///
    /// Jobs that were cancelled or superseded are ignored.
    pub fn fire(&mut self, job: DeferredJob) -> Option<Event> {
        if self.pending != Some(job) {
            debug!(token = job.token, "ignoring stale deferred job");
            return None;
        }
        self.pending = None;
        match job.kind {
            DeferredKind::Advance => {
                if self.state.status != TimerStatus::Completed {
                    return None;
                }
                let next = self.next_session_type();
                Some(self.initialize_session(next))
            }
            DeferredKind::AutoStart => self.start(),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete_session(&mut self) -> Event {
        self.state.time_remaining = 0;
        self.state.status = TimerStatus::Completed;
        self.state.completed_sessions += 1;
        let session = CompletedSession {
            session_id: self.state.current_session_id,
            cycle_id: self.state.cycle_id,
            session_type: self.state.current_session_type,
            round: self.state.current_round,
            subject_id: self.state.subject_id.clone(),
            duration_secs: self.state.total_time,
            started_at: self.state.started_at,
            completed_at: Utc::now(),
        };
        info!(
            session_type = session.session_type.as_str(),
            round = session.round,
            completed = self.state.completed_sessions,
            "session completed"
        );
        self.schedule(DeferredKind::Advance, self.options.completion_delay);
        Event::SessionCompleted { session }
    }

    fn initialize_session(&mut self, session_type: SessionType) -> Event {
        match session_type {
            SessionType::ShortBreak => {
                self.state.current_round = self.state.current_round.saturating_add(1);
            }
            SessionType::LongBreak => {
                self.state.current_round = 1;
                let cycle_id = Uuid::new_v4();
                self.state.cycle_id = Some(cycle_id);
                info!(%cycle_id, "long break, new cycle");
            }
            SessionType::Work => {}
        }
        let total = self.settings.duration_secs(session_type);
        self.state.current_session_type = session_type;
        self.state.total_time = total;
        self.state.time_remaining = total;
        self.state.status = TimerStatus::Idle;
        self.state.current_session_id = None;
        self.state.started_at = None;
        self.enforce_invariants();

        let auto_start = self.settings.auto_starts(session_type);
        if auto_start {
            self.schedule(DeferredKind::AutoStart, self.options.auto_start_delay);
        }
        Event::SessionInitialized {
            session_type,
            round: self.state.current_round,
            cycle_id: self.state.cycle_id,
            duration_secs: total,
            auto_start,
            at: Utc::now(),
        }
    }

    fn schedule(&mut self, kind: DeferredKind, after: Duration) {
        self.cancel_pending();
        self.next_token += 1;
        let job = DeferredJob {
            token: self.next_token,
            kind,
        };
        self.pending = Some(job);
        self.scheduler.schedule(after, job);
    }

    fn cancel_pending(&mut self) {
        if let Some(job) = self.pending.take() {
            self.scheduler.cancel(job.token);
        }
    }

    fn enforce_invariants(&mut self) {
        let max_round = self.settings.sessions_until_long_break.max(1);
        debug_assert!(
            self.state.time_remaining <= self.state.total_time,
            "time_remaining {} exceeds total_time {}",
            self.state.time_remaining,
            self.state.total_time
        );
        self.state.time_remaining = self.state.time_remaining.min(self.state.total_time);
        self.state.current_round = self.state.current_round.clamp(1, max_round);
    }
}

impl TimerEngine<ManualScheduler> {
    /// Move the virtual clock forward, firing every job that falls due,
    /// including jobs scheduled by earlier jobs within the same window.
    pub fn advance_clock(&mut self, by: Duration) -> Vec<Event> {
        let until = self.scheduler.now() + by;
        let mut events = Vec::new();
        while let Some(job) = self.scheduler.pop_due(until) {
            events.extend(self.fire(job));
        }
        self.scheduler.set_now(until);
        events
    }
}
