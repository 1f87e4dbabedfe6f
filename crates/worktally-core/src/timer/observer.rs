use chrono::{DateTime, Utc};

use super::engine::StoppedRun;
use crate::error::CoreError;
use crate::storage::EntryId;

/// Subscriber to tracker lifecycle transitions.
///
/// The tracker has already committed its own transition when a hook runs, so
/// a failing hook can only add a warning to the result. Every hook has a
/// no-op default.
pub trait TrackerObserver {
    /// A run began. At most one observer should hand back the id of an
    /// entry created for it.
    fn on_start(&mut self, _label: &str, _at: DateTime<Utc>) -> Result<Option<EntryId>, CoreError> {
        Ok(None)
    }

    fn on_pause(&mut self, _elapsed_ms: u64, _at: DateTime<Utc>) {}

    fn on_resume(&mut self, _at: DateTime<Utc>) {}

    /// A run finished and the tracker is idle again.
    fn on_stop(&mut self, _run: &StoppedRun) -> Result<(), CoreError> {
        Ok(())
    }

    /// A run was abandoned without finalizing its entry.
    fn on_reset(&mut self, _at: DateTime<Utc>) {}
}
