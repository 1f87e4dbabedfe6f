//! # Worktally Core Library
//!
//! This library provides the time-tracking engine behind the `worktally` CLI.
//! The CLI is a thin layer over the same core library; any other host can
//! embed a [`Session`] the same way.
//!
//! ## Architecture
//!
//! - **Tracker**: A wall-clock-based elapsed-time state machine. Elapsed time
//!   is recomputed from timestamps on every read, so the caller may invoke
//!   `tick()` as irregularly as it likes
//! - **Cycle layer**: Focus/break countdown composed over the tracker
//! - **Alerts**: Notification scheduler with independent interval and
//!   threshold cadences
//! - **Sync**: Provisional entries created on start and finalized on stop
//! - **Storage**: SQLite key-value store and entry log, TOML configuration
//!
//! ## Key Components
//!
//! - [`Session`]: Orchestrates all of the above over injected collaborators
//! - [`TrackerEngine`]: Core tracker state machine
//! - [`Database`]: State and entry persistence
//! - [`Config`]: Application configuration management

pub mod alerts;
pub mod clock;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod sync;
pub mod timer;

pub use alerts::{Alert, AlertKind, LogNotifier, NotificationScheduler, Notifier, RecordingNotifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, EntryLogError, Outcome, StoreError};
pub use events::Event;
pub use session::{Report, Session};
pub use storage::{Config, Database, Entry, EntryId, EntryLog, KvStore, MemoryEntryLog, MemoryStore};
pub use sync::EntrySynchronizer;
pub use timer::{CycleEngine, Phase, StoppedRun, TrackerEngine, TrackerObserver, TrackerStatus};
