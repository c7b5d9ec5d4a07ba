use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::Command;
use crate::timer::{DeferredJob, Scheduler};

/// Runs deferred jobs as tokio sleep tasks that feed back into the service's
/// command channel.
///
/// Holds only a weak sender so a pending job never keeps the service alive
/// after every [`TimerHandle`](super::TimerHandle) is gone.
pub struct TokioScheduler {
    commands: mpsc::WeakUnboundedSender<Command>,
    tasks: HashMap<u64, AbortHandle>,
}

impl TokioScheduler {
    pub(crate) fn new(commands: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self {
            commands,
            tasks: HashMap::new(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }

    pub(crate) fn cancel_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, after: Duration, job: DeferredJob) {
        self.tasks.retain(|_, h| !h.is_finished());
        let commands = self.commands.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(Command::Fire(job));
            }
        });
        self.tasks.insert(job.token, task.abort_handle());
    }

    fn cancel(&mut self, token: u64) {
        if let Some(handle) = self.tasks.remove(&token) {
            handle.abort();
        }
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
