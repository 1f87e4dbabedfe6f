//! One tracking session: the tracker, the cycle layer, the notification
//! scheduler and the entry synchronizer wired together over injected
//! collaborators.
//!
//! The host drives a session with discrete commands plus periodic calls to
//! [`Session::tick`]. Every command recomputes from the clock, so ticks may
//! arrive late or not at all. State is written to the key-value store after
//! every mutation and rehydrated once in [`Session::new`].

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::alerts::{Alert, AlertKind, CadenceState, NotificationScheduler, Notifier, TickReading};
use crate::clock::Clock;
use crate::error::{CoreError, Outcome, StoreError};
use crate::events::Event;
use crate::storage::{Config, Entry, EntryId, EntryLog, KvStore};
use crate::sync::{EntrySynchronizer, PendingFinalize};
use crate::timer::{
    CycleEngine, CycleState, Phase, PhaseCompletion, StoppedRun, TrackerEngine, TrackerObserver,
    TrackerState,
};

pub const TRACKER_STATE_KEY: &str = "tracker_state";
pub const CYCLE_STATE_KEY: &str = "cycle_state";
pub const CADENCE_STATE_KEY: &str = "cadence_state";
pub const PENDING_SYNC_KEY: &str = "entry_sync_pending";

/// What one command or tick did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub events: Vec<Event>,
    /// The run this call ended, if any.
    pub stopped: Option<StoppedRun>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.stopped.is_none()
    }

    pub fn alerts(&self) -> impl Iterator<Item = AlertKind> + '_ {
        self.events.iter().filter_map(|e| match e {
            Event::AlertFired { kind, .. } => Some(*kind),
            _ => None,
        })
    }
}

pub struct Session {
    config: Config,
    clock: Arc<dyn Clock>,
    store: Box<dyn KvStore>,
    notifier: Box<dyn Notifier>,
    tracker: TrackerEngine,
    cycle: CycleEngine,
    scheduler: NotificationScheduler,
    sync: EntrySynchronizer,
    /// Seconds already in the log for a day, excluding the live run.
    logged_today: Option<(NaiveDate, u64)>,
}

impl Session {
    /// Rehydrate a session from `store`.
    ///
    /// Missing or unreadable records fall back to a fresh state; the
    /// failures come back as warnings.
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        store: Box<dyn KvStore>,
        log: Box<dyn EntryLog>,
        notifier: Box<dyn Notifier>,
    ) -> Outcome<Self> {
        let mut warnings = Vec::new();

        let tracker = load_json::<TrackerState>(store.as_ref(), TRACKER_STATE_KEY, &mut warnings)
            .map(TrackerEngine::from_state)
            .unwrap_or_default();
        let durations = config.cycle.durations();
        let cycle = match load_json::<CycleState>(store.as_ref(), CYCLE_STATE_KEY, &mut warnings) {
            Some(state) => CycleEngine::from_state(durations, state),
            None => CycleEngine::new(durations),
        };
        let mut scheduler = NotificationScheduler::from_config(&config);
        if let Some(states) = load_json::<Vec<CadenceState>>(store.as_ref(), CADENCE_STATE_KEY, &mut warnings) {
            scheduler.restore_state(&states);
        }
        let mut sync = EntrySynchronizer::new(log, clock.clone(), config.tracker.clone());
        if let Some(pending) = load_json::<Vec<PendingFinalize>>(store.as_ref(), PENDING_SYNC_KEY, &mut warnings) {
            sync.restore_pending(pending);
        }

        let mut session = Self {
            config,
            clock,
            store,
            notifier,
            tracker,
            cycle,
            scheduler,
            sync,
            logged_today: None,
        };

        if session.cycle.is_awaiting_advance() {
            let (now, today) = (session.clock.now(), session.clock.today());
            session.cycle.advance(now, today);
            warnings.extend(session.persist());
        }
        info!(
            tracker = ?session.tracker.status(),
            phase = ?session.cycle.phase(),
            "session restored"
        );
        Outcome::with_warnings(session, warnings)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tracker(&self) -> &TrackerEngine {
        &self.tracker
    }

    pub fn cycle(&self) -> &CycleEngine {
        &self.cycle
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    pub fn pending_finalizations(&self) -> &[PendingFinalize] {
        self.sync.pending()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Elapsed seconds of the active run, 0 while idle.
    pub fn current_elapsed(&self) -> u64 {
        self.tracker.current_elapsed_secs(self.clock.now())
    }

    pub fn current_elapsed_ms(&self) -> u64 {
        self.tracker.current_elapsed_ms(self.clock.now())
    }

    pub fn formatted_elapsed(&self) -> String {
        self.tracker.formatted_elapsed(self.clock.now())
    }

    pub fn is_running(&self) -> bool {
        self.tracker.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.tracker.is_paused()
    }

    pub fn phase(&self) -> Phase {
        self.cycle.phase()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.cycle.remaining_secs(self.clock.now())
    }

    pub fn cycle_progress_pct(&self) -> f64 {
        self.cycle.progress_pct(self.clock.now())
    }

    /// Everything tracked today: the log plus the live run.
    pub fn today_total_secs(&mut self) -> Outcome<u64> {
        let mut warnings = Vec::new();
        let total = self.today_total(self.clock.now(), self.clock.today(), &mut warnings);
        Outcome::with_warnings(total, warnings)
    }

    pub fn snapshot(&mut self) -> Outcome<Event> {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut warnings = Vec::new();
        let today_total_secs = self.today_total(now, today, &mut warnings);
        let state = self.tracker.state();
        let event = Event::StateSnapshot {
            status: self.tracker.status(),
            label: state.active_label.clone(),
            elapsed_ms: self.tracker.current_elapsed_ms(now),
            formatted_elapsed: self.tracker.formatted_elapsed(now),
            entry_id: state.linked_entry_id.clone(),
            phase: self.cycle.phase(),
            cycle_running: self.cycle.is_running(),
            remaining_ms: self.cycle.remaining_ms(now),
            cycle_progress_pct: self.cycle.progress_pct(now),
            completed_focus_count: self.cycle.completed_today(today),
            today_total_secs,
            at: now,
        };
        Outcome::with_warnings(event, warnings)
    }

    pub fn entries_on(&self, date: NaiveDate) -> Result<Vec<Entry>, CoreError> {
        Ok(self.sync.entries_on(date)?)
    }

    pub fn entries_today(&self) -> Result<Vec<Entry>, CoreError> {
        self.entries_on(self.clock.today())
    }

    // ── Tracker commands ─────────────────────────────────────────────

    pub fn start(&mut self, label: &str) -> Outcome<Report> {
        let now = self.clock.now();
        let mut out = Outcome::clean(Report::default());
        self.start_tracker(label, now, &mut out);
        self.finish(out)
    }

    pub fn pause(&mut self) -> Outcome<Report> {
        let now = self.clock.now();
        let mut out = Outcome::clean(Report::default());
        self.catch_up_cycle(now, &mut out);
        self.pause_tracker(now, &mut out);
        self.finish(out)
    }

    pub fn resume(&mut self) -> Outcome<Report> {
        let now = self.clock.now();
        let mut out = Outcome::clean(Report::default());
        self.resume_tracker(now, &mut out);
        self.finish(out)
    }

    /// Finish the run. `report.stopped` carries the final elapsed time; its
    /// `entry_id` is `None` when no entry exists and the caller has to record
    /// the time some other way.
    pub fn stop(&mut self) -> Outcome<Report> {
        let now = self.clock.now();
        let mut out = Outcome::clean(Report::default());
        self.catch_up_cycle(now, &mut out);
        self.stop_tracker(now, &mut out);
        self.finish(out)
    }

    /// Abandon the run. Its provisional entry stays in the log untouched.
    pub fn reset(&mut self) -> Outcome<Report> {
        let now = self.clock.now();
        let mut out = Outcome::clean(Report::default());
        self.catch_up_cycle(now, &mut out);
        let focus_halted = self.focus_running();
        let mut observers: [&mut dyn TrackerObserver; 3] =
            [&mut self.sync, &mut self.scheduler, &mut self.cycle];
        if let Some(event) = self.tracker.reset(now, &mut observers) {
            out.value.events.push(event);
            self.push_cycle_halt(focus_halted, now, &mut out);
            self.lifecycle_alert(AlertKind::TrackerReset, now, &mut out);
        }
        self.finish(out)
    }

    /// The manual earnings step for a finished entry.
    pub fn record_earnings(&mut self, id: &EntryId, earned: f64) -> Result<Entry, CoreError> {
        Ok(self.sync.record_earnings(id, earned)?)
    }

    // ── Cycle commands ───────────────────────────────────────────────

    /// Run the current phase. A focus phase makes sure the tracker is
    /// active; a run already in progress is joined, never restarted.
    pub fn start_cycle(&mut self) -> Outcome<Report> {
        let now = self.clock.now();
        let mut out = Outcome::clean(Report::default());
        self.start_cycle_phase(now, &mut out);
        self.finish(out)
    }

    /// Pause the countdown and the tracker with it.
    pub fn pause_cycle(&mut self) -> Outcome<Report> {
        let now = self.clock.now();
        let mut out = Outcome::clean(Report::default());
        self.catch_up_cycle(now, &mut out);
        if let Some(event) = self.cycle.pause(now) {
            out.value.events.push(event);
        }
        self.pause_tracker(now, &mut out);
        self.finish(out)
    }

    pub fn resume_cycle(&mut self) -> Outcome<Report> {
        let now = self.clock.now();
        let mut out = Outcome::clean(Report::default());
        if let Some(event) = self.cycle.resume(now) {
            out.value.events.push(event);
        }
        self.resume_tracker(now, &mut out);
        self.finish(out)
    }

    /// Rewind the countdown and finish any active run.
    pub fn stop_cycle(&mut self) -> Outcome<Report> {
        let now = self.clock.now();
        let mut out = Outcome::clean(Report::default());
        self.catch_up_cycle(now, &mut out);
        if let Some(event) = self.cycle.reset(now) {
            out.value.events.push(event);
        }
        self.stop_tracker(now, &mut out);
        self.finish(out)
    }

    /// Rewind the countdown only.
    pub fn reset_cycle(&mut self) -> Outcome<Report> {
        let now = self.clock.now();
        let mut out = Outcome::clean(Report::default());
        if let Some(event) = self.cycle.reset(now) {
            out.value.events.push(event);
        }
        self.finish(out)
    }

    /// Move to the next phase without a completion alert. A skipped focus
    /// phase still counts.
    pub fn skip_phase(&mut self) -> Outcome<Report> {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut out = Outcome::clean(Report::default());
        out.value.events.push(self.cycle.advance(now, today));
        self.finish(out)
    }

    // ── Periodic evaluation ──────────────────────────────────────────

    /// One evaluation pass.
    ///
    /// Order within a pass: queued finalizations are retried, the tracker's
    /// elapsed time is recomputed, the scheduler reads it, and only then
    /// does the cycle check for completion. When a focus countdown ran out
    /// before this tick, the scheduler reads elapsed time as of that instant.
    pub fn tick(&mut self) -> Outcome<Report> {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut out = Outcome::clean(Report::default());

        if !self.sync.pending().is_empty() {
            out.warnings.extend(self.sync.retry_pending(now));
        }

        let reading_at = self.focus_due_before(now).unwrap_or(now);
        let elapsed_secs = self
            .tracker
            .is_active()
            .then(|| self.tracker.current_elapsed_secs(reading_at));
        let today_total_secs = self.today_total(reading_at, today, &mut out.warnings);
        let reading = TickReading {
            elapsed_secs,
            today_total_secs,
            today,
            at: now,
        };
        for alert in self.scheduler.evaluate(&reading) {
            self.dispatch(alert, &mut out);
        }

        if let Some(done) = self.cycle.tick(now) {
            self.complete_phase(done, now, today, &mut out);
        }

        self.finish(out)
    }

    /// The host is visible again: drop cached totals and evaluate at once.
    pub fn on_foreground_regained(&mut self) -> Outcome<Report> {
        self.logged_today = None;
        self.tick()
    }

    /// Swap in a new configuration. Firing state of unchanged cadences and
    /// any running countdown are kept.
    pub fn update_config(&mut self, config: Config) -> Outcome<()> {
        self.scheduler.reconfigure(&config);
        self.cycle.set_durations(config.cycle.durations());
        self.sync.set_config(config.tracker.clone());
        self.config = config;
        self.logged_today = None;
        let warnings = self.persist();
        Outcome::with_warnings((), warnings)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn start_tracker(&mut self, label: &str, now: DateTime<Utc>, out: &mut Outcome<Report>) {
        let mut observers: [&mut dyn TrackerObserver; 3] =
            [&mut self.sync, &mut self.scheduler, &mut self.cycle];
        let started = self.tracker.start(label, now, &mut observers);
        out.warnings.extend(started.warnings);
        if let Some(event) = started.value {
            out.value.events.push(event);
            self.lifecycle_alert(AlertKind::TrackerStarted, now, out);
        }
    }

    fn pause_tracker(&mut self, now: DateTime<Utc>, out: &mut Outcome<Report>) {
        let mut observers: [&mut dyn TrackerObserver; 3] =
            [&mut self.sync, &mut self.scheduler, &mut self.cycle];
        if let Some(event) = self.tracker.pause(now, &mut observers) {
            out.value.events.push(event);
            self.lifecycle_alert(AlertKind::TrackerPaused, now, out);
        }
    }

    fn resume_tracker(&mut self, now: DateTime<Utc>, out: &mut Outcome<Report>) {
        let mut observers: [&mut dyn TrackerObserver; 3] =
            [&mut self.sync, &mut self.scheduler, &mut self.cycle];
        if let Some(event) = self.tracker.resume(now, &mut observers) {
            out.value.events.push(event);
            self.lifecycle_alert(AlertKind::TrackerResumed, now, out);
        }
    }

    fn stop_tracker(&mut self, now: DateTime<Utc>, out: &mut Outcome<Report>) {
        let focus_halted = self.focus_running();
        let mut observers: [&mut dyn TrackerObserver; 3] =
            [&mut self.sync, &mut self.scheduler, &mut self.cycle];
        let stopped = self.tracker.stop(now, &mut observers);
        out.warnings.extend(stopped.warnings);
        if let Some(run) = stopped.value {
            self.logged_today = None;
            out.value.events.push(run.event());
            out.value.stopped = Some(run);
            self.push_cycle_halt(focus_halted, now, out);
            self.lifecycle_alert(AlertKind::TrackerStopped, now, out);
        }
    }

    fn start_cycle_phase(&mut self, now: DateTime<Utc>, out: &mut Outcome<Report>) {
        let Some(event) = self.cycle.start(now) else {
            return;
        };
        out.value.events.push(event);
        if self.cycle.phase() != Phase::Focus {
            return;
        }
        if self.tracker.is_paused() {
            self.resume_tracker(now, out);
        } else if !self.tracker.is_active() {
            let label = self.config.cycle.default_label.clone();
            self.start_tracker(&label, now, out);
        } else {
            info!(label = ?self.tracker.label(), "cycle joined the active run");
        }
    }

    /// Settle a countdown that ran out since the last tick, so the command
    /// that follows acts on what the completion left behind.
    fn catch_up_cycle(&mut self, now: DateTime<Utc>, out: &mut Outcome<Report>) {
        if let Some(done) = self.cycle.tick(now) {
            let today = self.clock.today();
            self.complete_phase(done, now, today, out);
        }
    }

    /// The tracker stops at the instant the focus countdown reached zero;
    /// the next phase begins at `now`.
    fn complete_phase(
        &mut self,
        done: PhaseCompletion,
        now: DateTime<Utc>,
        today: NaiveDate,
        out: &mut Outcome<Report>,
    ) {
        let counted = self.cycle.completed_today(today) + u32::from(done.phase == Phase::Focus);
        out.value.events.push(done.event(counted));

        if done.phase == Phase::Focus && self.tracker.is_running() {
            self.stop_tracker(done.at, out);
        }

        let n = &self.config.notifications;
        if self.config.cycle.sound_on_complete && n.sound_enabled {
            let kind = if done.phase.is_break() {
                AlertKind::BreakComplete
            } else {
                AlertKind::FocusComplete
            };
            let message = format!("{} complete", done.phase.label());
            self.dispatch(Alert::sound(kind, done.at).with_message(message), out);
        }

        out.value.events.push(self.cycle.advance(now, today));

        let auto_start = match done.phase {
            Phase::Focus => self.config.cycle.auto_start_breaks,
            Phase::ShortBreak | Phase::LongBreak => self.config.cycle.auto_start_work,
        };
        if auto_start {
            self.start_cycle_phase(now, out);
        }
    }

    fn focus_running(&self) -> bool {
        self.cycle.is_running() && self.cycle.phase() == Phase::Focus
    }

    /// When a focus countdown driving a running tracker reached zero
    /// before `now`.
    fn focus_due_before(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !(self.focus_running() && self.tracker.is_running()) {
            return None;
        }
        self.cycle.due_at().filter(|due| *due < now)
    }

    /// Report a focus countdown halted by the tracker going idle.
    fn push_cycle_halt(&self, was_running: bool, now: DateTime<Utc>, out: &mut Outcome<Report>) {
        if was_running && !self.cycle.is_running() {
            out.value.events.push(Event::CycleReset {
                phase: self.cycle.phase(),
                remaining_ms: self.cycle.remaining_ms(now),
                at: now,
            });
        }
    }

    fn lifecycle_alert(&self, kind: AlertKind, now: DateTime<Utc>, out: &mut Outcome<Report>) {
        let n = &self.config.notifications;
        if n.lifecycle_sounds && n.sound_enabled {
            self.dispatch(Alert::sound(kind, now), out);
        }
    }

    fn dispatch(&self, alert: Alert, out: &mut Outcome<Report>) {
        self.notifier.dispatch(&alert);
        out.value.events.push(alert.event());
    }

    fn today_total(&mut self, now: DateTime<Utc>, today: NaiveDate, warnings: &mut Vec<CoreError>) -> u64 {
        let logged = match self.logged_today {
            Some((date, secs)) if date == today => secs,
            _ => {
                let secs = match self.sync.logged_secs_on(today) {
                    Ok(secs) => secs,
                    Err(e) => {
                        warn!(error = %e, "could not read today's entries, counting only the live run");
                        warnings.push(e.into());
                        0
                    }
                };
                self.logged_today = Some((today, secs));
                secs
            }
        };
        // A run that began before local midnight only counts from midnight.
        let since_midnight = u64::from(self.clock.to_local(now).time().num_seconds_from_midnight());
        let live = self.tracker.current_elapsed_secs(now).min(since_midnight);
        logged.saturating_add(live)
    }

    fn finish(&mut self, mut out: Outcome<Report>) -> Outcome<Report> {
        out.warnings.extend(self.persist());
        out
    }

    /// Write every record to the store. Failures are returned, never raised.
    fn persist(&self) -> Vec<CoreError> {
        let mut warnings = Vec::new();
        save_json(self.store.as_ref(), TRACKER_STATE_KEY, self.tracker.state(), &mut warnings);
        save_json(self.store.as_ref(), CYCLE_STATE_KEY, self.cycle.state(), &mut warnings);
        save_json(self.store.as_ref(), CADENCE_STATE_KEY, &self.scheduler.export_state(), &mut warnings);
        save_json(self.store.as_ref(), PENDING_SYNC_KEY, self.sync.pending(), &mut warnings);
        warnings
    }
}

fn load_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str, warnings: &mut Vec<CoreError>) -> Option<T> {
    match store.load(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "stored state is corrupt, starting fresh");
                warnings.push(
                    StoreError::Corrupt {
                        key: key.to_string(),
                        message: e.to_string(),
                    }
                    .into(),
                );
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(key, error = %e, "could not load stored state, starting fresh");
            warnings.push(e.into());
            None
        }
    }
}

fn save_json<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T, warnings: &mut Vec<CoreError>) {
    let result = serde_json::to_string(value)
        .map_err(CoreError::from)
        .and_then(|raw| store.save(key, &raw).map_err(CoreError::from));
    if let Err(e) = result {
        warn!(key, error = %e, "could not persist state");
        warnings.push(e);
    }
}
