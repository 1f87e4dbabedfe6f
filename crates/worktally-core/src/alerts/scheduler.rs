//! Multi-cadence notification scheduler.
//!
//! Each cadence keeps its own firing state. Interval cadences compute their
//! current boundary by floor division of the run's elapsed time, so however
//! late a tick arrives a boundary fires exactly once and a long gap catches
//! up to the latest boundary only. Threshold cadences compare today's total
//! against a fixed number of seconds and fire at most once per calendar day.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::notifier::{Alert, AlertKind};
use crate::error::CoreError;
use crate::storage::{Config, EntryId};
use crate::timer::{StoppedRun, TrackerObserver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceKind {
    PeriodicReminder,
    HourlyMilestone,
    OvertimeWarning,
    OvertimeCritical,
}

impl CadenceKind {
    pub fn alert_kind(self) -> AlertKind {
        match self {
            CadenceKind::PeriodicReminder => AlertKind::PeriodicReminder,
            CadenceKind::HourlyMilestone => AlertKind::HourlyMilestone,
            CadenceKind::OvertimeWarning => AlertKind::OvertimeWarning,
            CadenceKind::OvertimeCritical => AlertKind::OvertimeCritical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CadenceRule {
    /// Every multiple of `every_secs` of the current run's elapsed time.
    Interval { every_secs: u64 },
    /// Today's tracked total reaching `threshold_secs`.
    Threshold { threshold_secs: u64 },
}

/// Firing state of one cadence. Persisted so a restart never repeats an
/// alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadenceState {
    pub kind: CadenceKind,
    /// `None` for threshold cadences.
    pub interval_secs: Option<u64>,
    /// Elapsed seconds of the boundary this cadence last fired for.
    pub last_fired_at_elapsed: u64,
    /// Day a threshold cadence last fired.
    #[serde(default)]
    pub fired_on: Option<NaiveDate>,
}

/// What the scheduler sees on one tick. `elapsed_secs` must already be
/// recomputed for `at`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReading {
    /// Elapsed time of the active run; `None` while the tracker is idle.
    pub elapsed_secs: Option<u64>,
    /// Everything tracked today, including the active run.
    pub today_total_secs: u64,
    pub today: NaiveDate,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Cadence {
    rule: CadenceRule,
    sound: Option<String>,
    state: CadenceState,
}

impl Cadence {
    fn new(kind: CadenceKind, rule: CadenceRule, sound: Option<String>) -> Self {
        let interval_secs = match rule {
            CadenceRule::Interval { every_secs } => Some(every_secs),
            CadenceRule::Threshold { .. } => None,
        };
        Self {
            rule,
            sound,
            state: CadenceState {
                kind,
                interval_secs,
                last_fired_at_elapsed: 0,
                fired_on: None,
            },
        }
    }

    fn kind(&self) -> CadenceKind {
        self.state.kind
    }

    /// Returns whether the cadence fires for this reading and records it.
    fn check(&mut self, reading: &TickReading) -> bool {
        match self.rule {
            CadenceRule::Interval { every_secs } => {
                let Some(elapsed) = reading.elapsed_secs else {
                    return false;
                };
                if every_secs == 0 {
                    return false;
                }
                let boundary = elapsed / every_secs * every_secs;
                if boundary > 0 && self.state.last_fired_at_elapsed < boundary {
                    self.state.last_fired_at_elapsed = boundary;
                    true
                } else {
                    false
                }
            }
            CadenceRule::Threshold { threshold_secs } => {
                if self.state.fired_on == Some(reading.today) {
                    return false;
                }
                if reading.today_total_secs >= threshold_secs {
                    self.state.fired_on = Some(reading.today);
                    self.state.last_fired_at_elapsed = reading.today_total_secs;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn rewind_interval(&mut self) {
        if matches!(self.rule, CadenceRule::Interval { .. }) {
            self.state.last_fired_at_elapsed = 0;
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationScheduler {
    cadences: Vec<Cadence>,
    daily_goal_hours: f64,
}

impl NotificationScheduler {
    /// Build the cadences a configuration enables.
    pub fn from_config(config: &Config) -> Self {
        let n = &config.notifications;
        let sound = |name: &str, on: bool| (n.sound_enabled && on).then(|| name.to_string());
        let mut cadences = Vec::new();

        if n.reminder_interval_min > 0 {
            cadences.push(Cadence::new(
                CadenceKind::PeriodicReminder,
                CadenceRule::Interval {
                    every_secs: n.reminder_interval_min.saturating_mul(60),
                },
                sound(&n.reminder_sound, true),
            ));
        }
        if n.hourly_alerts {
            cadences.push(Cadence::new(
                CadenceKind::HourlyMilestone,
                CadenceRule::Interval { every_secs: 3600 },
                sound(AlertKind::HourlyMilestone.default_sound(), true),
            ));
        }
        if n.overtime_alerts_enabled && config.daily_goal_hours > 0.0 {
            let threshold = |ratio: f64| (config.daily_goal_hours * ratio * 3600.0).round() as u64;
            cadences.push(Cadence::new(
                CadenceKind::OvertimeWarning,
                CadenceRule::Threshold {
                    threshold_secs: threshold(n.overtime_warning_ratio),
                },
                sound(AlertKind::OvertimeWarning.default_sound(), n.overtime_sound_alert),
            ));
            cadences.push(Cadence::new(
                CadenceKind::OvertimeCritical,
                CadenceRule::Threshold {
                    threshold_secs: threshold(n.overtime_critical_ratio),
                },
                sound(AlertKind::OvertimeCritical.default_sound(), n.overtime_sound_alert),
            ));
        }

        Self {
            cadences,
            daily_goal_hours: config.daily_goal_hours,
        }
    }

    /// Rebuild from a new configuration, keeping firing state for cadences
    /// whose rule did not change.
    pub fn reconfigure(&mut self, config: &Config) {
        let previous = self.export_state();
        *self = Self::from_config(config);
        self.restore_state(&previous);
    }

    pub fn rules(&self) -> Vec<(CadenceKind, CadenceRule)> {
        self.cadences.iter().map(|c| (c.kind(), c.rule)).collect()
    }

    /// Check every cadence once and return the alerts that fire, in
    /// configuration order.
    pub fn evaluate(&mut self, reading: &TickReading) -> Vec<Alert> {
        let mut fired = Vec::new();
        for cadence in &mut self.cadences {
            if !cadence.check(reading) {
                continue;
            }
            let kind = cadence.kind();
            let message = match kind {
                CadenceKind::PeriodicReminder | CadenceKind::HourlyMilestone => {
                    format!("{} elapsed", describe_secs(cadence.state.last_fired_at_elapsed))
                }
                CadenceKind::OvertimeWarning | CadenceKind::OvertimeCritical => {
                    overtime_message(kind, reading.today_total_secs, self.daily_goal_hours)
                }
            };
            info!(?kind, boundary = cadence.state.last_fired_at_elapsed, "cadence fired");
            fired.push(
                Alert::sound(kind.alert_kind(), reading.at)
                    .with_sound(cadence.sound.clone())
                    .with_message(message),
            );
        }
        fired
    }

    pub fn export_state(&self) -> Vec<CadenceState> {
        self.cadences.iter().map(|c| c.state.clone()).collect()
    }

    /// Take over persisted firing state. Entries for cadences that are not
    /// configured, or whose interval changed, are ignored.
    pub fn restore_state(&mut self, states: &[CadenceState]) {
        for cadence in &mut self.cadences {
            if let Some(saved) = states
                .iter()
                .find(|s| s.kind == cadence.kind() && s.interval_secs == cadence.state.interval_secs)
            {
                cadence.state.last_fired_at_elapsed = saved.last_fired_at_elapsed;
                cadence.state.fired_on = saved.fired_on;
            }
        }
    }

    pub fn state_of(&self, kind: CadenceKind) -> Option<&CadenceState> {
        self.cadences
            .iter()
            .find(|c| c.kind() == kind)
            .map(|c| &c.state)
    }

    fn rewind_intervals(&mut self) {
        for cadence in &mut self.cadences {
            cadence.rewind_interval();
        }
    }
}

impl TrackerObserver for NotificationScheduler {
    fn on_start(&mut self, _label: &str, _at: DateTime<Utc>) -> Result<Option<EntryId>, CoreError> {
        self.rewind_intervals();
        Ok(None)
    }

    fn on_stop(&mut self, _run: &StoppedRun) -> Result<(), CoreError> {
        self.rewind_intervals();
        Ok(())
    }

    fn on_reset(&mut self, _at: DateTime<Utc>) {
        self.rewind_intervals();
    }
}

fn describe_secs(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    match (hours, minutes) {
        (0, m) => format!("{m} min"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m} min"),
    }
}

fn overtime_message(kind: CadenceKind, total_secs: u64, goal_hours: f64) -> String {
    let total = total_secs as f64 / 3600.0;
    let over = (total - goal_hours).max(0.0);
    let prefix = if kind == CadenceKind::OvertimeCritical {
        "Critical overtime"
    } else {
        "Overtime"
    };
    format!("{prefix}: {total:.1}h worked today (goal {goal_hours}h), {over:.1}h over")
}
