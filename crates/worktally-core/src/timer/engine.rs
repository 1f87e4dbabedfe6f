//! Elapsed-time tracker.
//!
//! The tracker is a wall-clock-based state machine. It does not use internal
//! threads and never increments a counter per tick: elapsed time is always
//! recomputed from the stored segment start, so a late or missing tick cannot
//! bias the result. Every command takes the current instant explicitly.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused -> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut tracker = TrackerEngine::new();
//! tracker.start("design", clock.now(), &mut []);
//! // Any time later:
//! let ms = tracker.current_elapsed_ms(clock.now());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::observer::TrackerObserver;
use crate::clock::elapsed_ms_between;
use crate::error::Outcome;
use crate::events::Event;
use crate::storage::EntryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerStatus {
    Idle,
    Running,
    Paused,
}

/// Persisted tracker record. Saved after every mutation and restored
/// verbatim on restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    /// What is being tracked. `None` means idle.
    pub active_label: Option<String>,
    /// Start of the current run segment; `None` while idle or paused.
    pub started_at: Option<DateTime<Utc>>,
    /// Milliseconds banked from completed segments.
    pub accumulated_ms: u64,
    pub is_paused: bool,
    /// Provisional log entry created for the current run.
    pub linked_entry_id: Option<EntryId>,
}

/// What `stop` hands back once a run is over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoppedRun {
    pub label: String,
    pub elapsed_ms: u64,
    /// The entry that was finalized, if one was ever created. When this is
    /// `None` the caller owns creating a record for `elapsed_ms`.
    pub entry_id: Option<EntryId>,
    pub at: DateTime<Utc>,
}

impl StoppedRun {
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_ms / 1000
    }

    pub fn event(&self) -> Event {
        Event::TrackerStopped {
            label: self.label.clone(),
            elapsed_ms: self.elapsed_ms,
            entry_id: self.entry_id.clone(),
            at: self.at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerEngine {
    state: TrackerState,
}

impl TrackerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate from a persisted record.
    ///
    /// Records that break the idle/paused invariants are repaired rather
    /// than rejected.
    pub fn from_state(mut state: TrackerState) -> Self {
        if state.active_label.is_none() {
            if state.started_at.is_some() || state.accumulated_ms > 0 || state.linked_entry_id.is_some() {
                warn!("restored tracker had no label but carried run data, resetting to idle");
            }
            state = TrackerState::default();
        } else if state.is_paused && state.started_at.is_some() {
            warn!("restored tracker was paused with an open segment, dropping the segment");
            state.started_at = None;
        } else if !state.is_paused && state.started_at.is_none() {
            warn!("restored tracker was running without a segment start, treating as paused");
            state.is_paused = true;
        }
        Self { state }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn status(&self) -> TrackerStatus {
        match (&self.state.active_label, self.state.is_paused) {
            (None, _) => TrackerStatus::Idle,
            (Some(_), true) => TrackerStatus::Paused,
            (Some(_), false) => TrackerStatus::Running,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.active_label.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.status() == TrackerStatus::Running
    }

    pub fn is_paused(&self) -> bool {
        self.status() == TrackerStatus::Paused
    }

    pub fn label(&self) -> Option<&str> {
        self.state.active_label.as_deref()
    }

    pub fn linked_entry_id(&self) -> Option<&EntryId> {
        self.state.linked_entry_id.as_ref()
    }

    /// Banked time plus the open segment, recomputed from timestamps.
    pub fn current_elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        let open = self
            .state
            .started_at
            .map(|since| elapsed_ms_between(since, now))
            .unwrap_or(0);
        self.state.accumulated_ms.saturating_add(open)
    }

    pub fn current_elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        self.current_elapsed_ms(now) / 1000
    }

    pub fn hours(&self, now: DateTime<Utc>) -> f64 {
        self.current_elapsed_ms(now) as f64 / 3_600_000.0
    }

    /// `HH:MM:SS`; hours are not wrapped at 24.
    pub fn formatted_elapsed(&self, now: DateTime<Utc>) -> String {
        format_hms(self.current_elapsed_secs(now))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a run. Ignored unless idle.
    ///
    /// Observers run after the transition; the first entry id one of them
    /// returns is linked to the run. Observer failures become warnings.
    pub fn start(
        &mut self,
        label: &str,
        now: DateTime<Utc>,
        observers: &mut [&mut dyn TrackerObserver],
    ) -> Outcome<Option<Event>> {
        if self.is_active() {
            debug!(label, "start ignored, tracker already active");
            return Outcome::clean(None);
        }
        self.state = TrackerState {
            active_label: Some(label.to_string()),
            started_at: Some(now),
            accumulated_ms: 0,
            is_paused: false,
            linked_entry_id: None,
        };

        let mut warnings = Vec::new();
        for observer in observers.iter_mut() {
            match observer.on_start(label, now) {
                Ok(Some(id)) if self.state.linked_entry_id.is_none() => {
                    self.state.linked_entry_id = Some(id);
                }
                Ok(_) => {}
                Err(e) => warnings.push(e),
            }
        }
        info!(label, entry = ?self.state.linked_entry_id, "tracker started");

        Outcome::with_warnings(
            Some(Event::TrackerStarted {
                label: label.to_string(),
                entry_id: self.state.linked_entry_id.clone(),
                at: now,
            }),
            warnings,
        )
    }

    /// Bank the open segment. Ignored unless running.
    pub fn pause(
        &mut self,
        now: DateTime<Utc>,
        observers: &mut [&mut dyn TrackerObserver],
    ) -> Option<Event> {
        if !self.is_running() {
            debug!("pause ignored, tracker not running");
            return None;
        }
        self.flush_segment(now);
        self.state.is_paused = true;
        let elapsed_ms = self.state.accumulated_ms;
        for observer in observers.iter_mut() {
            observer.on_pause(elapsed_ms, now);
        }
        info!(elapsed_ms, "tracker paused");
        Some(Event::TrackerPaused { elapsed_ms, at: now })
    }

    /// Open a new segment. Ignored unless paused.
    pub fn resume(
        &mut self,
        now: DateTime<Utc>,
        observers: &mut [&mut dyn TrackerObserver],
    ) -> Option<Event> {
        if !self.is_paused() {
            debug!("resume ignored, tracker not paused");
            return None;
        }
        self.state.started_at = Some(now);
        self.state.is_paused = false;
        for observer in observers.iter_mut() {
            observer.on_resume(now);
        }
        info!(elapsed_ms = self.state.accumulated_ms, "tracker resumed");
        Some(Event::TrackerResumed {
            elapsed_ms: self.state.accumulated_ms,
            at: now,
        })
    }

    /// Finish the run and go idle. Ignored while idle.
    ///
    /// The tracker is idle before any observer runs, so a failing observer
    /// never leaves a half-stopped run behind.
    pub fn stop(
        &mut self,
        now: DateTime<Utc>,
        observers: &mut [&mut dyn TrackerObserver],
    ) -> Outcome<Option<StoppedRun>> {
        let Some(label) = self.state.active_label.clone() else {
            debug!("stop ignored, tracker idle");
            return Outcome::clean(None);
        };
        let run = StoppedRun {
            label,
            elapsed_ms: self.current_elapsed_ms(now),
            entry_id: self.state.linked_entry_id.clone(),
            at: now,
        };
        self.state = TrackerState::default();

        let mut warnings = Vec::new();
        for observer in observers.iter_mut() {
            if let Err(e) = observer.on_stop(&run) {
                warnings.push(e);
            }
        }
        info!(label = %run.label, elapsed_ms = run.elapsed_ms, entry = ?run.entry_id, "tracker stopped");
        Outcome::with_warnings(Some(run), warnings)
    }

    /// Abandon the run without finalizing anything. Ignored while idle.
    pub fn reset(
        &mut self,
        now: DateTime<Utc>,
        observers: &mut [&mut dyn TrackerObserver],
    ) -> Option<Event> {
        let label = self.state.active_label.take()?;
        let elapsed_ms = self.current_elapsed_ms(now);
        if let Some(id) = &self.state.linked_entry_id {
            info!(entry = %id, "tracker reset, provisional entry left in the log");
        }
        self.state = TrackerState::default();
        for observer in observers.iter_mut() {
            observer.on_reset(now);
        }
        info!(label = %label, elapsed_ms, "tracker reset");
        Some(Event::TrackerReset {
            label,
            elapsed_ms,
            at: now,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn flush_segment(&mut self, now: DateTime<Utc>) {
        if let Some(since) = self.state.started_at.take() {
            let segment = elapsed_ms_between(since, now);
            self.state.accumulated_ms = self.state.accumulated_ms.saturating_add(segment);
        }
    }
}

pub fn format_hms(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
