//! Single-writer timer service.
//!
//! [`TimerService`] owns the [`TimerEngine`] inside a tokio task. Every
//! mutation, whether it comes from a UI event, the one-second ticker or a
//! deferred job, travels through one unbounded command channel, so commands
//! are applied strictly one at a time.
//!
//! Readers get the latest [`TimerSnapshot`] from a `watch` channel and the
//! event stream from a `broadcast` channel.

mod scheduler;
mod ticker;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{CoreError, Result, ValidationError};
use crate::events::Event;
use crate::notify::{Notification, Notifier};
use crate::timer::{
    DeferredJob, EngineOptions, SettingsPatch, TimerEngine, TimerProgress, TimerSettings,
    TimerState,
};

pub use scheduler::TokioScheduler;
pub use ticker::{spawn_ticker, TICK_INTERVAL};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum Command {
    Start,
    Pause,
    Reset,
    Skip,
    Tick,
    SetSubject(Option<String>),
    UpdateSettings {
        patch: SettingsPatch,
        reply: oneshot::Sender<Result<TimerSettings, ValidationError>>,
    },
    /// A deferred job coming back from the scheduler.
    Fire(DeferredJob),
    Shutdown,
}

/// What readers see: the timer state plus the settings it runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub settings: TimerSettings,
}

/// Cloneable front door to a running [`TimerService`].
#[derive(Debug, Clone)]
pub struct TimerHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<TimerSnapshot>,
    events: broadcast::Sender<Event>,
}

impl TimerHandle {
    pub fn start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn reset(&self) -> Result<()> {
        self.send(Command::Reset)
    }

    pub fn skip(&self) -> Result<()> {
        self.send(Command::Skip)
    }

    pub fn tick(&self) -> Result<()> {
        self.send(Command::Tick)
    }

    pub fn set_subject(&self, subject_id: Option<String>) -> Result<()> {
        self.send(Command::SetSubject(subject_id))
    }

    /// Apply a settings patch and wait for the outcome.
    ///
    /// # Errors
    /// [`CoreError::Validation`] when the patch is rejected,
    /// [`CoreError::ServiceClosed`] when the service is gone.
    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<TimerSettings> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::UpdateSettings { patch, reply })?;
        let settings = rx.await.map_err(|_| CoreError::ServiceClosed)??;
        Ok(settings)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> TimerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| CoreError::ServiceClosed)
    }
}

pub struct TimerService {
    engine: TimerEngine<TokioScheduler>,
    commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<TimerSnapshot>,
    events: broadcast::Sender<Event>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl TimerService {
    /// Spawn the service on the current tokio runtime.
    ///
    /// The returned join handle resolves to the final progress once the
    /// service shuts down, either via [`TimerHandle::shutdown`] or because
    /// every handle was dropped.
    pub fn spawn(
        settings: TimerSettings,
        progress: TimerProgress,
        options: EngineOptions,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> (TimerHandle, JoinHandle<TimerProgress>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let scheduler = TokioScheduler::new(command_tx.downgrade());
        let engine = TimerEngine::restore(settings, progress, options, scheduler);
        let (snapshot_tx, snapshot_rx) = watch::channel(TimerSnapshot {
            state: engine.state().clone(),
            settings: engine.settings().clone(),
        });
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let handle = TimerHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: event_tx.clone(),
        };
        let service = TimerService {
            engine,
            commands: command_rx,
            snapshots: snapshot_tx,
            events: event_tx,
            notifiers,
        };
        (handle, tokio::spawn(service.run()))
    }

    async fn run(mut self) -> TimerProgress {
        debug!("timer service started");
        while let Some(command) = self.commands.recv().await {
            let event = match command {
                Command::Start => self.engine.start(),
                Command::Pause => self.engine.pause(),
                Command::Reset => self.engine.reset(),
                Command::Skip => self.engine.skip(),
                Command::Tick => self.engine.tick(),
                Command::SetSubject(subject_id) => self.engine.set_subject(subject_id),
                Command::UpdateSettings { patch, reply } => {
                    let (event, outcome) = match self.engine.update_settings(&patch) {
                        Ok(event) => (event, Ok(self.engine.settings().clone())),
                        Err(e) => (None, Err(e)),
                    };
                    // Readers woken by the reply must already see the new snapshot.
                    self.publish();
                    let _ = reply.send(outcome);
                    event
                }
                Command::Fire(job) => self.engine.fire(job),
                Command::Shutdown => break,
            };
            self.publish();
            if let Some(event) = event {
                self.dispatch(event);
            }
        }
        self.engine.scheduler_mut().cancel_all();
        debug!("timer service stopped");
        self.engine.progress_state()
    }

    fn publish(&self) {
        let next = TimerSnapshot {
            state: self.engine.state().clone(),
            settings: self.engine.settings().clone(),
        };
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn dispatch(&self, event: Event) {
        if let Event::SessionCompleted { session } = &event {
            let notification = Notification::for_completion(
                session.session_type,
                self.engine.next_session_type(),
                self.engine.settings(),
            );
            if let Some(notification) = notification {
                for notifier in &self.notifiers {
                    notifier.notify(&notification);
                }
            }
        }
        if self.events.send(event).is_err() {
            // No subscribers right now.
            debug!("event dropped without subscribers");
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        if self.engine.scheduler().in_flight() > 0 {
            warn!("timer service dropped with deferred jobs in flight");
            self.engine.scheduler_mut().cancel_all();
        }
    }
}
