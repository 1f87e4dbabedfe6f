//! Records of the external entry log.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields of a provisional entry created when tracking starts.
///
/// The log stores it with no end time, zero duration, zero earnings and
/// the provisional flag set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub label: String,
    pub description: String,
    pub rate: f64,
    /// When the run started. Stored as the creation time.
    pub at: DateTime<Utc>,
}

/// Finalization of a provisional entry.
///
/// There is deliberately no earnings field: the user enters earnings by
/// hand and the effective rate is derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryUpdate {
    pub end: NaiveTime,
    pub duration_hours: f64,
    /// When the update is written.
    pub at: DateTime<Utc>,
}

impl EntryUpdate {
    pub fn from_elapsed(end: NaiveTime, elapsed_ms: u64, at: DateTime<Utc>) -> Self {
        Self {
            end,
            duration_hours: elapsed_ms as f64 / 3_600_000.0,
            at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    /// `None` while the entry is still provisional.
    pub end: Option<NaiveTime>,
    pub duration_hours: f64,
    pub earned: f64,
    pub rate: f64,
    pub label: String,
    pub description: String,
    /// System-generated and not yet finalized.
    pub provisional: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    /// Materialize a new provisional record.
    pub fn provisional(id: EntryId, fields: &NewEntry) -> Self {
        Self {
            id,
            date: fields.date,
            start: fields.start,
            end: None,
            duration_hours: 0.0,
            earned: 0.0,
            rate: fields.rate,
            label: fields.label.clone(),
            description: fields.description.clone(),
            provisional: true,
            created_at: fields.at,
            updated_at: fields.at,
        }
    }

    pub fn apply(&mut self, update: &EntryUpdate) {
        self.end = Some(update.end);
        self.duration_hours = update.duration_hours;
        self.provisional = false;
        self.updated_at = update.at;
    }

    pub fn duration_secs(&self) -> u64 {
        if self.duration_hours.is_finite() && self.duration_hours > 0.0 {
            (self.duration_hours * 3600.0).round() as u64
        } else {
            0
        }
    }

    /// Hourly rate implied by what the user says they earned.
    pub fn effective_rate(&self) -> Option<f64> {
        (self.earned > 0.0 && self.duration_hours > 0.0).then(|| self.earned / self.duration_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entry {
        let fields = NewEntry {
            date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            label: "design".into(),
            description: "Timer session".into(),
            rate: 1000.0,
            at: Utc::now(),
        };
        Entry::provisional(EntryId::from("e-1"), &fields)
    }

    #[test]
    fn provisional_entry_is_blank() {
        let entry = sample();
        assert!(entry.provisional);
        assert_eq!(entry.end, None);
        assert_eq!(entry.duration_hours, 0.0);
        assert_eq!(entry.earned, 0.0);
        assert_eq!(entry.effective_rate(), None);
    }

    #[test]
    fn apply_finalizes_without_touching_earnings() {
        let mut entry = sample();
        let stopped_at = entry.created_at + chrono::Duration::seconds(3661);
        let update = EntryUpdate::from_elapsed(NaiveTime::from_hms_opt(10, 1, 1).unwrap(), 3_661_000, stopped_at);
        entry.apply(&update);
        assert_eq!(entry.updated_at, stopped_at);
        assert!(!entry.provisional);
        assert!((entry.duration_hours - 1.016_944).abs() < 1e-5);
        assert_eq!(entry.earned, 0.0);
        assert_eq!(entry.duration_secs(), 3661);
    }

    #[test]
    fn effective_rate_derives_from_earnings() {
        let mut entry = sample();
        entry.duration_hours = 2.0;
        entry.earned = 3000.0;
        assert_eq!(entry.effective_rate(), Some(1500.0));
    }
}
