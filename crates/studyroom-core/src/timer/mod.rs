mod engine;
mod scheduler;
mod session;
mod settings;

pub use engine::TimerEngine;
pub use scheduler::{DeferredJob, DeferredKind, EngineOptions, ManualScheduler, Scheduler};
pub use session::{CompletedSession, SessionType, TimerProgress, TimerState, TimerStatus};
pub use settings::{SettingsPatch, TimerSettings, MAX_DURATION_MIN};
