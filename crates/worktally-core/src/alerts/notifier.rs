use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PeriodicReminder,
    HourlyMilestone,
    OvertimeWarning,
    OvertimeCritical,
    TrackerStarted,
    TrackerPaused,
    TrackerResumed,
    TrackerStopped,
    TrackerReset,
    FocusComplete,
    BreakComplete,
}

impl AlertKind {
    /// Sound played when no other sound is configured for the alert.
    pub fn default_sound(self) -> &'static str {
        match self {
            AlertKind::PeriodicReminder => "chime",
            AlertKind::HourlyMilestone => "hourlyAlert",
            AlertKind::OvertimeWarning => "alert",
            AlertKind::OvertimeCritical => "alarm",
            AlertKind::TrackerStarted => "timerStart",
            AlertKind::TrackerPaused => "pause",
            AlertKind::TrackerResumed => "resume",
            AlertKind::TrackerStopped => "timerStop",
            AlertKind::TrackerReset => "reset",
            AlertKind::FocusComplete => "success",
            AlertKind::BreakComplete => "chime",
        }
    }
}

/// One alert dispatch: an optional sound plus an optional visual message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub sound: Option<String>,
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

impl Alert {
    pub fn sound(kind: AlertKind, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            sound: Some(kind.default_sound().to_string()),
            message: None,
            at,
        }
    }

    pub fn with_sound(mut self, sound: Option<String>) -> Self {
        self.sound = sound;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn event(&self) -> Event {
        Event::AlertFired {
            kind: self.kind,
            sound: self.sound.clone(),
            message: self.message.clone(),
            at: self.at,
        }
    }
}

/// Renders alerts. Fire-and-forget: must not block and cannot fail.
pub trait Notifier {
    fn dispatch(&self, alert: &Alert);
}

/// Writes alerts to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn dispatch(&self, alert: &Alert) {
        info!(kind = ?alert.kind, sound = ?alert.sound, message = ?alert.message, "alert");
    }
}

/// Keeps every alert it receives. Clones share one buffer.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.lock().clone()
    }

    pub fn count(&self, kind: AlertKind) -> usize {
        self.lock().iter().filter(|a| a.kind == kind).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Alert>> {
        self.alerts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for RecordingNotifier {
    fn dispatch(&self, alert: &Alert) {
        self.lock().push(alert.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_shares_buffer_between_clones() {
        let notifier = RecordingNotifier::new();
        let handle = notifier.clone();
        notifier.dispatch(&Alert::sound(AlertKind::HourlyMilestone, Utc::now()));
        assert_eq!(handle.count(AlertKind::HourlyMilestone), 1);
        assert_eq!(handle.alerts()[0].sound.as_deref(), Some("hourlyAlert"));
        handle.clear();
        assert!(notifier.alerts().is_empty());
    }

    #[test]
    fn silent_alert_keeps_message() {
        let alert = Alert::sound(AlertKind::OvertimeWarning, Utc::now())
            .with_sound(None)
            .with_message("8.5h worked");
        match alert.event() {
            Event::AlertFired { sound, message, .. } => {
                assert!(sound.is_none());
                assert_eq!(message.as_deref(), Some("8.5h worked"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
