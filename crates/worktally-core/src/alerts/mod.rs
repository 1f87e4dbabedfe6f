//! Alert dispatch and the multi-cadence notification scheduler.

mod notifier;
mod scheduler;

pub use notifier::{Alert, AlertKind, LogNotifier, Notifier, RecordingNotifier};
pub use scheduler::{CadenceKind, CadenceRule, CadenceState, NotificationScheduler, TickReading};
