//! Focus/break countdown layered over the tracker.
//!
//! The countdown is drift-corrected the same way the tracker is: remaining
//! time is reduced by the wall-clock delta since the last flush, never by a
//! fixed step. Completion only stops the countdown; advancing to the next
//! phase is a separate call so the caller can react to the finished phase
//! first.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::engine::StoppedRun;
use super::observer::TrackerObserver;
use super::schedule::{CycleDurations, Phase};
use crate::clock::elapsed_ms_between;
use crate::error::CoreError;
use crate::events::Event;

/// Persisted cycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleState {
    pub phase: Phase,
    pub remaining_ms: u64,
    pub is_running: bool,
    /// Focus phases completed on `count_date`.
    pub completed_focus_count: u32,
    #[serde(default)]
    pub total_focus_count: u64,
    #[serde(default)]
    pub count_date: Option<NaiveDate>,
    /// Last instant remaining time was flushed; `None` while not running.
    #[serde(default)]
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl CycleState {
    pub fn fresh(durations: &CycleDurations) -> Self {
        Self {
            phase: Phase::Focus,
            remaining_ms: durations.duration_ms(Phase::Focus),
            is_running: false,
            completed_focus_count: 0,
            total_focus_count: 0,
            count_date: None,
            last_tick_at: None,
        }
    }
}

/// A phase that ran out. Carries the phase that just ended and the instant
/// its countdown reached zero, which may be earlier than the tick that
/// noticed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCompletion {
    pub phase: Phase,
    pub at: DateTime<Utc>,
}

impl PhaseCompletion {
    pub fn event(&self, completed_focus_count: u32) -> Event {
        Event::PhaseCompleted {
            phase: self.phase,
            completed_focus_count,
            at: self.at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleEngine {
    durations: CycleDurations,
    state: CycleState,
}

impl CycleEngine {
    pub fn new(durations: CycleDurations) -> Self {
        Self {
            state: CycleState::fresh(&durations),
            durations,
        }
    }

    pub fn from_state(durations: CycleDurations, state: CycleState) -> Self {
        let full = durations.duration_ms(state.phase);
        let mut state = state;
        if state.remaining_ms > full {
            debug!(phase = ?state.phase, "restored countdown longer than its phase, clamping");
            state.remaining_ms = full;
        }
        if !state.is_running {
            state.last_tick_at = None;
        }
        Self { durations, state }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn durations(&self) -> &CycleDurations {
        &self.durations
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    /// Countdown reached zero and the next phase has not been entered yet.
    pub fn is_awaiting_advance(&self) -> bool {
        !self.state.is_running && self.state.remaining_ms == 0
    }

    pub fn completed_focus_count(&self) -> u32 {
        self.state.completed_focus_count
    }

    /// Focus phases completed on `today`. Counts from an earlier day read as 0.
    pub fn completed_today(&self, today: NaiveDate) -> u32 {
        match self.state.count_date {
            Some(date) if date == today => self.state.completed_focus_count,
            _ => 0,
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.durations.duration_ms(self.state.phase)
    }

    /// Live remaining time without flushing.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.state.last_tick_at {
            Some(last) if self.state.is_running => self
                .state
                .remaining_ms
                .saturating_sub(elapsed_ms_between(last, now)),
            _ => self.state.remaining_ms,
        }
    }

    /// When a running countdown reaches zero.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        let last = self.state.last_tick_at.filter(|_| self.state.is_running)?;
        let remaining = i64::try_from(self.state.remaining_ms).unwrap_or(i64::MAX);
        last.checked_add_signed(Duration::milliseconds(remaining))
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        self.remaining_ms(now).div_ceil(1000)
    }

    /// 0.0 .. 100.0 progress within the current phase.
    pub fn progress_pct(&self, now: DateTime<Utc>) -> f64 {
        let total = self.total_ms();
        if total == 0 {
            return 0.0;
        }
        let done = total.saturating_sub(self.remaining_ms(now));
        (done as f64 / total as f64 * 100.0).min(100.0)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Run the countdown. A countdown left at zero restarts from the full
    /// phase length.
    pub fn start(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state.is_running {
            debug!("cycle start ignored, already running");
            return None;
        }
        if self.state.remaining_ms == 0 {
            self.state.remaining_ms = self.total_ms();
        }
        self.state.is_running = true;
        self.state.last_tick_at = Some(now);
        info!(phase = ?self.state.phase, remaining_ms = self.state.remaining_ms, "cycle started");
        Some(Event::CycleStarted {
            phase: self.state.phase,
            remaining_ms: self.state.remaining_ms,
            at: now,
        })
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if !self.state.is_running {
            debug!("cycle pause ignored, not running");
            return None;
        }
        self.flush(now);
        self.state.is_running = false;
        self.state.last_tick_at = None;
        Some(Event::CyclePaused {
            phase: self.state.phase,
            remaining_ms: self.state.remaining_ms,
            at: now,
        })
    }

    /// Continue a paused countdown. Ignored when nothing is left to run.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state.is_running || self.state.remaining_ms == 0 {
            debug!("cycle resume ignored");
            return None;
        }
        self.state.is_running = true;
        self.state.last_tick_at = Some(now);
        Some(Event::CycleResumed {
            phase: self.state.phase,
            remaining_ms: self.state.remaining_ms,
            at: now,
        })
    }

    /// Stop the countdown and rewind it to the full phase length. The phase
    /// itself is kept.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<Event> {
        self.state.is_running = false;
        self.state.last_tick_at = None;
        self.state.remaining_ms = self.total_ms();
        Some(Event::CycleReset {
            phase: self.state.phase,
            remaining_ms: self.state.remaining_ms,
            at: now,
        })
    }

    /// Flush elapsed time. Returns the finished phase when the countdown
    /// runs out; the engine is then stopped at zero until [`advance`] is
    /// called.
    ///
    /// [`advance`]: CycleEngine::advance
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<PhaseCompletion> {
        if !self.state.is_running {
            return None;
        }
        let due = self.due_at();
        self.flush(now);
        if self.state.remaining_ms > 0 {
            return None;
        }
        self.state.is_running = false;
        self.state.last_tick_at = None;
        let at = due.map_or(now, |due| due.min(now));
        info!(phase = ?self.state.phase, %at, "phase completed");
        Some(PhaseCompletion {
            phase: self.state.phase,
            at,
        })
    }

    /// Move to the next phase, stopped and rewound.
    ///
    /// Leaving a focus phase counts it, whether it ran out or was skipped.
    /// The daily count starts over when `today` differs from the day it was
    /// last bumped.
    pub fn advance(&mut self, now: DateTime<Utc>, today: NaiveDate) -> Event {
        let from = self.state.phase;
        if from == Phase::Focus {
            if self.state.count_date != Some(today) {
                self.state.completed_focus_count = 0;
                self.state.count_date = Some(today);
            }
            self.state.completed_focus_count += 1;
            self.state.total_focus_count += 1;
        }
        let to = self
            .durations
            .next_phase(from, self.state.completed_focus_count);
        self.state.phase = to;
        self.state.remaining_ms = self.durations.duration_ms(to);
        self.state.is_running = false;
        self.state.last_tick_at = None;
        info!(?from, ?to, completed = self.state.completed_focus_count, "cycle advanced");
        Event::PhaseAdvanced {
            from,
            to,
            completed_focus_count: self.state.completed_focus_count,
            remaining_ms: self.state.remaining_ms,
            at: now,
        }
    }

    /// Swap in new phase lengths. An idle countdown is rewound to the new
    /// length; a running one keeps its remaining time.
    pub fn set_durations(&mut self, durations: CycleDurations) {
        self.durations = durations;
        if !self.state.is_running && self.state.remaining_ms > 0 {
            self.state.remaining_ms = self.total_ms();
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn flush(&mut self, now: DateTime<Utc>) {
        if let Some(last) = self.state.last_tick_at {
            let elapsed = elapsed_ms_between(last, now);
            self.state.remaining_ms = self.state.remaining_ms.saturating_sub(elapsed);
            self.state.last_tick_at = Some(now);
        }
    }
}

impl TrackerObserver for CycleEngine {
    /// A run stopped outside the cycle while a focus countdown was going:
    /// halt the countdown so it does not race a stopped tracker.
    fn on_stop(&mut self, run: &StoppedRun) -> Result<(), CoreError> {
        self.halt_focus(run.at);
        Ok(())
    }

    fn on_reset(&mut self, at: DateTime<Utc>) {
        self.halt_focus(at);
    }
}

impl CycleEngine {
    fn halt_focus(&mut self, at: DateTime<Utc>) {
        if self.state.is_running && self.state.phase == Phase::Focus {
            info!("tracker stopped externally, halting focus countdown");
            self.reset(at);
        }
    }
}
