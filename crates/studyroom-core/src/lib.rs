//! # Studyroom Core Library
//!
//! This library provides the core logic for the Studyroom Pomodoro study
//! timer. All behaviour lives here; the CLI binary is a thin host that wires
//! the pieces together.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a tick-driven state machine that sequences work, short
//!   break and long break sessions and tracks rounds and cycles
//! - **Timer Service**: a single-writer tokio task that owns the engine and
//!   serializes every command, plus the one-second ticker
//! - **Storage**: SQLite session records and progress, TOML configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerService`] / [`TimerHandle`]: Message-passing front end
//! - [`Database`]: Session records and progress persistence
//! - [`Config`]: Application configuration management
//! - [`Notifier`]: Completion notification sink

pub mod error;
pub mod events;
pub mod notify;
pub mod service;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use notify::{Notification, Notifier, TracingNotifier};
pub use service::{spawn_ticker, TimerHandle, TimerService, TimerSnapshot};
pub use storage::{Config, ConfigStore, Database, ProgressStore, SessionRecord, SettingsStore};
pub use timer::{
    CompletedSession, EngineOptions, ManualScheduler, SessionType, SettingsPatch, TimerEngine,
    TimerProgress, TimerSettings, TimerState, TimerStatus,
};
