use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::AlertKind;
use crate::storage::EntryId;
use crate::timer::{Phase, TrackerStatus};

/// Every state change in the engine produces an Event.
/// Hosts render them; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TrackerStarted {
        label: String,
        entry_id: Option<EntryId>,
        at: DateTime<Utc>,
    },
    TrackerPaused {
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    TrackerResumed {
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    /// The run is over. `entry_id` is `None` when no entry could be created
    /// for it; the elapsed time is then the caller's to record.
    TrackerStopped {
        label: String,
        elapsed_ms: u64,
        entry_id: Option<EntryId>,
        at: DateTime<Utc>,
    },
    /// The run was abandoned. Its provisional entry, if any, stays in the log.
    TrackerReset {
        label: String,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    CycleStarted {
        phase: Phase,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    CyclePaused {
        phase: Phase,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    CycleResumed {
        phase: Phase,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    CycleReset {
        phase: Phase,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    /// A countdown ran out. `phase` is the phase that just ended.
    PhaseCompleted {
        phase: Phase,
        completed_focus_count: u32,
        at: DateTime<Utc>,
    },
    PhaseAdvanced {
        from: Phase,
        to: Phase,
        completed_focus_count: u32,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    AlertFired {
        kind: AlertKind,
        sound: Option<String>,
        message: Option<String>,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TrackerStatus,
        label: Option<String>,
        elapsed_ms: u64,
        formatted_elapsed: String,
        entry_id: Option<EntryId>,
        phase: Phase,
        cycle_running: bool,
        remaining_ms: u64,
        cycle_progress_pct: f64,
        completed_focus_count: u32,
        today_total_secs: u64,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::TrackerStarted { at, .. }
            | Event::TrackerPaused { at, .. }
            | Event::TrackerResumed { at, .. }
            | Event::TrackerStopped { at, .. }
            | Event::TrackerReset { at, .. }
            | Event::CycleStarted { at, .. }
            | Event::CyclePaused { at, .. }
            | Event::CycleResumed { at, .. }
            | Event::CycleReset { at, .. }
            | Event::PhaseCompleted { at, .. }
            | Event::PhaseAdvanced { at, .. }
            | Event::AlertFired { at, .. }
            | Event::StateSnapshot { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::PhaseCompleted {
            phase: Phase::ShortBreak,
            completed_focus_count: 2,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PhaseCompleted");
        assert_eq!(json["phase"], "short_break");
    }
}
