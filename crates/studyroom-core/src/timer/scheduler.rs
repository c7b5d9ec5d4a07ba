//! Deferred work for the timer engine.
//!
//! The engine never sleeps. When it needs something to happen later (the
//! auto-advance after a completion, or an auto-start) it hands a
//! [`DeferredJob`] to a [`Scheduler`] and expects it back through
//! [`TimerEngine::fire`](super::TimerEngine::fire). Each job carries a token;
//! the engine ignores any job whose token is no longer the pending one.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferredKind {
    /// Leave `Completed` and initialize the next session.
    Advance,
    /// Start the freshly initialized session.
    AutoStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredJob {
    pub token: u64,
    pub kind: DeferredKind,
}

pub trait Scheduler {
    /// Arrange for `job` to be delivered back to the engine after `after`.
    fn schedule(&mut self, after: Duration, job: DeferredJob);

    /// Drop a previously scheduled job. Unknown tokens are ignored.
    fn cancel(&mut self, token: u64);
}

/// Delays used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub completion_delay: Duration,
    pub auto_start_delay: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            completion_delay: Duration::from_millis(2000),
            auto_start_delay: Duration::from_millis(1000),
        }
    }
}

/// A virtual-clock scheduler.
///
/// Nothing fires until the owner advances the clock. Used by tests and by
/// hosts that drive time themselves.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    queue: Vec<(Duration, DeferredJob)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Remove and return the earliest job due at or before `until`, moving
    /// the clock to its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<DeferredJob> {
        let (idx, _) = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, (due, _))| *due <= until)
            .min_by_key(|(_, (due, _))| *due)?;
        let (due, job) = self.queue.remove(idx);
        self.now = self.now.max(due);
        Some(job)
    }

    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, after: Duration, job: DeferredJob) {
        self.queue.push((self.now + after, job));
    }

    fn cancel(&mut self, token: u64) {
        self.queue.retain(|(_, job)| job.token != token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(token: u64) -> DeferredJob {
        DeferredJob {
            token,
            kind: DeferredKind::Advance,
        }
    }

    #[test]
    fn jobs_come_back_in_due_order() {
        let mut s = ManualScheduler::new();
        s.schedule(Duration::from_secs(2), job(1));
        s.schedule(Duration::from_secs(1), job(2));
        let until = Duration::from_secs(5);
        assert_eq!(s.pop_due(until), Some(job(2)));
        assert_eq!(s.now(), Duration::from_secs(1));
        assert_eq!(s.pop_due(until), Some(job(1)));
        assert_eq!(s.pop_due(until), None);
    }

    #[test]
    fn jobs_not_yet_due_stay_queued() {
        let mut s = ManualScheduler::new();
        s.schedule(Duration::from_secs(2), job(1));
        assert_eq!(s.pop_due(Duration::from_millis(1999)), None);
        assert_eq!(s.pending(), 1);
    }

    #[test]
    fn cancel_removes_only_matching_token() {
        let mut s = ManualScheduler::new();
        s.schedule(Duration::from_secs(1), job(1));
        s.schedule(Duration::from_secs(1), job(2));
        s.cancel(1);
        s.cancel(42);
        assert_eq!(s.pending(), 1);
        assert_eq!(s.pop_due(Duration::from_secs(1)), Some(job(2)));
    }

    #[test]
    fn delays_are_relative_to_virtual_now() {
        let mut s = ManualScheduler::new();
        s.set_now(Duration::from_secs(10));
        s.schedule(Duration::from_secs(1), job(7));
        assert_eq!(s.pop_due(Duration::from_secs(10)), None);
        assert_eq!(s.pop_due(Duration::from_secs(11)), Some(job(7)));
    }
}
