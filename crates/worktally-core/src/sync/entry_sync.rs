use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{CoreError, EntryLogError};
use crate::storage::{Entry, EntryId, EntryLog, EntryUpdate, NewEntry, TrackerConfig};
use crate::timer::{StoppedRun, TrackerObserver};

/// Attempts made for one finalization, counting the first, before it is
/// abandoned.
pub const MAX_FINALIZE_ATTEMPTS: u32 = 3;

/// Delay between finalization retries.
pub const FINALIZE_RETRY_SECS: i64 = 30;

/// A finalization the log refused, waiting for another attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFinalize {
    pub entry_id: EntryId,
    pub update: EntryUpdate,
    pub attempts: u32,
    pub retry_after: DateTime<Utc>,
}

/// Bridges tracker runs to the entry log.
pub struct EntrySynchronizer {
    log: Box<dyn EntryLog>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    pending: Vec<PendingFinalize>,
}

impl EntrySynchronizer {
    pub fn new(log: Box<dyn EntryLog>, clock: Arc<dyn Clock>, config: TrackerConfig) -> Self {
        Self {
            log,
            clock,
            config,
            pending: Vec::new(),
        }
    }

    pub fn set_config(&mut self, config: TrackerConfig) {
        self.config = config;
    }

    pub fn log(&self) -> &dyn EntryLog {
        self.log.as_ref()
    }

    /// Create the provisional entry for a run starting at `at`.
    pub fn on_tracker_start(&self, label: &str, at: DateTime<Utc>) -> Result<EntryId, EntryLogError> {
        let local = self.clock.to_local(at);
        let fields = NewEntry {
            date: local.date(),
            start: whole_seconds(local.time()),
            label: label.to_string(),
            description: self.config.entry_description.clone(),
            rate: self.config.rate_for(label),
            at,
        };
        let id = self.log.create_entry(&fields)?;
        info!(entry = %id, label, "provisional entry created");
        Ok(id)
    }

    /// Finalize the run's entry with its end time and duration. Earnings
    /// are never touched here.
    ///
    /// A run without an entry is a no-op. A log that cannot be reached gets
    /// the update queued for retry; the error is still returned so the
    /// caller can warn.
    pub fn on_tracker_stop(&mut self, run: &StoppedRun) -> Result<(), EntryLogError> {
        let Some(id) = &run.entry_id else {
            return Ok(());
        };
        let end = whole_seconds(self.clock.to_local(run.at).time());
        let update = EntryUpdate::from_elapsed(end, run.elapsed_ms, run.at);
        match self.log.update_entry(id, &update) {
            Ok(()) => {
                info!(entry = %id, hours = update.duration_hours, "entry finalized");
                Ok(())
            }
            Err(e @ EntryLogError::Unavailable(_)) => {
                warn!(entry = %id, error = %e, "entry finalization failed, queued for retry");
                self.pending.push(PendingFinalize {
                    entry_id: id.clone(),
                    update,
                    attempts: 1,
                    retry_after: run.at + Duration::seconds(FINALIZE_RETRY_SECS),
                });
                Err(e)
            }
            Err(e) => {
                warn!(entry = %id, error = %e, "entry finalization failed permanently");
                Err(e)
            }
        }
    }

    /// Retry queued finalizations that are due. Returns a warning for each
    /// one given up on.
    pub fn retry_pending(&mut self, now: DateTime<Utc>) -> Vec<CoreError> {
        let mut abandoned = Vec::new();
        let log = &self.log;
        self.pending.retain_mut(|pending| {
            if pending.retry_after > now {
                return true;
            }
            pending.update.at = now;
            match log.update_entry(&pending.entry_id, &pending.update) {
                Ok(()) => {
                    info!(entry = %pending.entry_id, attempts = pending.attempts + 1, "queued finalization succeeded");
                    false
                }
                Err(e) => {
                    pending.attempts += 1;
                    let permanent = !matches!(e, EntryLogError::Unavailable(_));
                    if permanent || pending.attempts >= MAX_FINALIZE_ATTEMPTS {
                        warn!(entry = %pending.entry_id, attempts = pending.attempts, error = %e, "giving up on entry finalization");
                        abandoned.push(CoreError::Custom(format!(
                            "entry {} could not be finalized after {} attempts: {e}",
                            pending.entry_id, pending.attempts
                        )));
                        false
                    } else {
                        pending.retry_after = now + Duration::seconds(FINALIZE_RETRY_SECS);
                        true
                    }
                }
            }
        });
        abandoned
    }

    pub fn pending(&self) -> &[PendingFinalize] {
        &self.pending
    }

    pub fn restore_pending(&mut self, pending: Vec<PendingFinalize>) {
        self.pending = pending;
    }

    /// The manual earnings step taken by the user after a run.
    pub fn record_earnings(&self, id: &EntryId, earned: f64) -> Result<Entry, EntryLogError> {
        if !earned.is_finite() || earned < 0.0 {
            return Err(EntryLogError::Rejected(format!(
                "earnings must be a non-negative number, got {earned}"
            )));
        }
        self.log.set_earned(id, earned, self.clock.now())?;
        self.log
            .find_entry(id)?
            .ok_or_else(|| EntryLogError::NotFound(id.to_string()))
    }

    pub fn entries_on(&self, date: NaiveDate) -> Result<Vec<Entry>, EntryLogError> {
        self.log.entries_on(date)
    }

    /// Seconds logged on `date`. Provisional entries count as zero.
    pub fn logged_secs_on(&self, date: NaiveDate) -> Result<u64, EntryLogError> {
        Ok(self
            .log
            .entries_on(date)?
            .iter()
            .map(Entry::duration_secs)
            .sum())
    }
}

impl TrackerObserver for EntrySynchronizer {
    fn on_start(&mut self, label: &str, at: DateTime<Utc>) -> Result<Option<EntryId>, CoreError> {
        match self.on_tracker_start(label, at) {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                warn!(label, error = %e, "could not create provisional entry, tracking without one");
                Err(e.into())
            }
        }
    }

    fn on_stop(&mut self, run: &StoppedRun) -> Result<(), CoreError> {
        self.on_tracker_stop(run).map_err(CoreError::from)
    }
}

fn whole_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryEntryLog;
    use std::rc::Rc;

    fn fixture() -> (Arc<ManualClock>, Rc<MemoryEntryLog>, EntrySynchronizer) {
        let clock = Arc::new(ManualClock::default());
        let log = Rc::new(MemoryEntryLog::new());
        let sync = EntrySynchronizer::new(Box::new(log.clone()), clock.clone(), TrackerConfig::default());
        (clock, log, sync)
    }

    fn run_for(id: Option<EntryId>, elapsed_ms: u64, at: DateTime<Utc>) -> StoppedRun {
        StoppedRun {
            label: "design".into(),
            elapsed_ms,
            entry_id: id,
            at,
        }
    }

    #[test]
    fn start_creates_provisional_entry() {
        let (clock, log, sync) = fixture();
        let id = sync.on_tracker_start("design", clock.now()).unwrap();
        let entry = log.find_entry(&id).unwrap().unwrap();
        assert!(entry.provisional);
        assert_eq!(entry.end, None);
        assert_eq!(entry.start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(entry.rate, 1000.0);
        assert_eq!(entry.earned, 0.0);
    }

    #[test]
    fn stop_finalizes_without_earnings() {
        let (clock, log, mut sync) = fixture();
        let id = sync.on_tracker_start("design", clock.now()).unwrap();
        clock.advance_secs(3661);
        sync.on_tracker_stop(&run_for(Some(id.clone()), 3_661_000, clock.now()))
            .unwrap();
        let entry = log.find_entry(&id).unwrap().unwrap();
        assert!(!entry.provisional);
        assert_eq!(entry.end, Some(NaiveTime::from_hms_opt(10, 1, 1).unwrap()));
        assert!((entry.duration_hours - 1.016_944).abs() < 1e-5);
        assert_eq!(entry.earned, 0.0);
    }

    #[test]
    fn entry_timestamps_follow_the_clock() {
        let (clock, log, mut sync) = fixture();
        let started = clock.now();
        let id = sync.on_tracker_start("design", started).unwrap();
        clock.advance_secs(600);
        sync.on_tracker_stop(&run_for(Some(id.clone()), 600_000, clock.now()))
            .unwrap();
        let entry = log.find_entry(&id).unwrap().unwrap();
        assert_eq!(entry.created_at, started);
        assert_eq!(entry.updated_at, clock.now());

        clock.advance_secs(60);
        let earned = sync.record_earnings(&id, 500.0).unwrap();
        assert_eq!(earned.updated_at, clock.now());
    }

    #[test]
    fn stop_without_entry_is_noop() {
        let (clock, log, mut sync) = fixture();
        sync.on_tracker_stop(&run_for(None, 5_000, clock.now())).unwrap();
        assert_eq!(log.update_count(), 0);
    }

    #[test]
    fn failed_finalize_is_retried_then_succeeds() {
        let (clock, log, mut sync) = fixture();
        let id = sync.on_tracker_start("design", clock.now()).unwrap();
        log.set_available(false);
        clock.advance_secs(600);
        assert!(sync
            .on_tracker_stop(&run_for(Some(id.clone()), 600_000, clock.now()))
            .is_err());
        assert_eq!(sync.pending().len(), 1);

        // Not due yet.
        log.set_available(true);
        assert!(sync.retry_pending(clock.now()).is_empty());
        assert_eq!(sync.pending().len(), 1);

        clock.advance_secs(FINALIZE_RETRY_SECS);
        assert!(sync.retry_pending(clock.now()).is_empty());
        assert!(sync.pending().is_empty());
        assert!(!log.find_entry(&id).unwrap().unwrap().provisional);
    }

    #[test]
    fn finalize_is_abandoned_after_max_attempts() {
        let (clock, log, mut sync) = fixture();
        let id = sync.on_tracker_start("design", clock.now()).unwrap();
        log.set_available(false);
        let _ = sync.on_tracker_stop(&run_for(Some(id), 1_000, clock.now()));

        let mut warnings = Vec::new();
        for _ in 1..MAX_FINALIZE_ATTEMPTS {
            clock.advance_secs(FINALIZE_RETRY_SECS);
            warnings.extend(sync.retry_pending(clock.now()));
        }
        assert_eq!(warnings.len(), 1);
        assert!(sync.pending().is_empty());
        assert_eq!(log.update_count(), 0);
    }

    #[test]
    fn record_earnings_sets_amount_and_rate() {
        let (clock, _log, mut sync) = fixture();
        let id = sync.on_tracker_start("design", clock.now()).unwrap();
        clock.advance_secs(7200);
        sync.on_tracker_stop(&run_for(Some(id.clone()), 7_200_000, clock.now()))
            .unwrap();
        let entry = sync.record_earnings(&id, 3000.0).unwrap();
        assert_eq!(entry.earned, 3000.0);
        assert_eq!(entry.effective_rate(), Some(1500.0));
        assert!(sync.record_earnings(&id, -1.0).is_err());
        assert!(sync.record_earnings(&EntryId::from("nope"), 1.0).is_err());
    }

    #[test]
    fn logged_seconds_ignore_provisional_entries() {
        let (clock, _log, mut sync) = fixture();
        let first = sync.on_tracker_start("a", clock.now()).unwrap();
        clock.advance_secs(1800);
        sync.on_tracker_stop(&run_for(Some(first), 1_800_000, clock.now()))
            .unwrap();
        sync.on_tracker_start("b", clock.now()).unwrap();
        assert_eq!(sync.logged_secs_on(clock.today()).unwrap(), 1800);
    }
}
