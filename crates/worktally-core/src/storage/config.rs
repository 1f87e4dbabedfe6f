//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Tracker defaults (label, hourly rates)
//! - Notification cadences and overtime thresholds
//! - Focus cycle durations and auto-advance policy
//!
//! Configuration is stored at `~/.config/worktally/config.toml`. The engine
//! itself never reads this file: callers load a [`Config`] and hand it in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::CycleDurations;

/// Tracker defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_label")]
    pub default_label: String,
    /// Hourly rate for labels without an entry in `rates`.
    #[serde(default = "default_rate")]
    pub default_rate: f64,
    #[serde(default = "default_entry_description")]
    pub entry_description: String,
    /// Per-label hourly rates.
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    /// Periodic reminder interval in minutes. 0 disables reminders.
    #[serde(default = "default_reminder_interval")]
    pub reminder_interval_min: u64,
    #[serde(default = "default_reminder_sound")]
    pub reminder_sound: String,
    #[serde(default = "default_true")]
    pub hourly_alerts: bool,
    /// Start/stop/pause/resume/reset sounds.
    #[serde(default = "default_true")]
    pub lifecycle_sounds: bool,
    #[serde(default = "default_true")]
    pub overtime_alerts_enabled: bool,
    #[serde(default = "default_true")]
    pub overtime_sound_alert: bool,
    #[serde(default = "default_warning_ratio")]
    pub overtime_warning_ratio: f64,
    #[serde(default = "default_critical_ratio")]
    pub overtime_critical_ratio: f64,
}

/// Focus cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    #[serde(default = "default_focus_min")]
    pub focus_min: u64,
    #[serde(default = "default_short_break_min")]
    pub short_break_min: u64,
    #[serde(default = "default_long_break_min")]
    pub long_break_min: u64,
    #[serde(default = "default_focus_before_long_break")]
    pub focus_before_long_break: u32,
    #[serde(default)]
    pub auto_start_breaks: bool,
    #[serde(default)]
    pub auto_start_work: bool,
    #[serde(default = "default_true")]
    pub sound_on_complete: bool,
    /// Label used when a cycle has to start the tracker itself.
    #[serde(default = "default_label")]
    pub default_label: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/worktally/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_daily_goal_hours")]
    pub daily_goal_hours: f64,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
}

// Default functions
fn default_label() -> String {
    "Work".into()
}
fn default_rate() -> f64 {
    1000.0
}
fn default_entry_description() -> String {
    "Timer session".into()
}
fn default_true() -> bool {
    true
}
fn default_reminder_interval() -> u64 {
    30
}
fn default_reminder_sound() -> String {
    "chime".into()
}
fn default_warning_ratio() -> f64 {
    1.0
}
fn default_critical_ratio() -> f64 {
    1.5
}
fn default_focus_min() -> u64 {
    25
}
fn default_short_break_min() -> u64 {
    5
}
fn default_long_break_min() -> u64 {
    15
}
fn default_focus_before_long_break() -> u32 {
    4
}
fn default_daily_goal_hours() -> f64 {
    8.0
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_label: default_label(),
            default_rate: default_rate(),
            entry_description: default_entry_description(),
            rates: BTreeMap::new(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            reminder_interval_min: default_reminder_interval(),
            reminder_sound: default_reminder_sound(),
            hourly_alerts: true,
            lifecycle_sounds: true,
            overtime_alerts_enabled: true,
            overtime_sound_alert: true,
            overtime_warning_ratio: default_warning_ratio(),
            overtime_critical_ratio: default_critical_ratio(),
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            focus_min: default_focus_min(),
            short_break_min: default_short_break_min(),
            long_break_min: default_long_break_min(),
            focus_before_long_break: default_focus_before_long_break(),
            auto_start_breaks: false,
            auto_start_work: false,
            sound_on_complete: true,
            default_label: default_label(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daily_goal_hours: default_daily_goal_hours(),
            tracker: TrackerConfig::default(),
            notifications: NotificationsConfig::default(),
            cycle: CycleConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn rate_for(&self, label: &str) -> f64 {
        self.rates.get(label).copied().unwrap_or(self.default_rate)
    }
}

impl CycleConfig {
    pub fn durations(&self) -> CycleDurations {
        CycleDurations {
            focus_secs: self.focus_min.saturating_mul(60),
            short_break_secs: self.short_break_min.saturating_mul(60),
            long_break_secs: self.long_break_min.saturating_mul(60),
            focus_before_long_break: self.focus_before_long_break,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.clone(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if !self.daily_goal_hours.is_finite() || self.daily_goal_hours < 0.0 {
            return Err(invalid("daily_goal_hours", "must be a non-negative number"));
        }
        let n = &self.notifications;
        if !(n.overtime_warning_ratio.is_finite() && n.overtime_warning_ratio > 0.0) {
            return Err(invalid("notifications.overtime_warning_ratio", "must be positive"));
        }
        if !(n.overtime_critical_ratio.is_finite() && n.overtime_critical_ratio > 0.0) {
            return Err(invalid("notifications.overtime_critical_ratio", "must be positive"));
        }
        if self.cycle.focus_min == 0 {
            return Err(invalid("cycle.focus_min", "must be at least one minute"));
        }
        if self.cycle.focus_before_long_break == 0 {
            return Err(invalid("cycle.focus_before_long_break", "must be at least 1"));
        }
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed = Config::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.daily_goal_hours, 8.0);
        assert_eq!(parsed.notifications.reminder_interval_min, 30);
        assert_eq!(parsed.cycle.focus_before_long_break, 4);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let parsed = Config::from_toml("daily_goal_hours = 6.5\n[cycle]\nfocus_min = 50\n").unwrap();
        assert_eq!(parsed.daily_goal_hours, 6.5);
        assert_eq!(parsed.cycle.focus_min, 50);
        assert_eq!(parsed.cycle.short_break_min, 5);
        assert_eq!(parsed.tracker.default_label, "Work");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("cycle.auto_start_breaks").as_deref(), Some("false"));
        assert_eq!(cfg.get("cycle.focus_min").as_deref(), Some("25"));
        assert_eq!(cfg.get("notifications.reminder_sound").as_deref(), Some("chime"));
        assert!(cfg.get("cycle.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("cycle.auto_start_work", "true").unwrap();
        cfg.apply("notifications.overtime_critical_ratio", "1.75").unwrap();
        cfg.apply("tracker.default_label", "Deep work").unwrap();
        assert!(cfg.cycle.auto_start_work);
        assert_eq!(cfg.notifications.overtime_critical_ratio, 1.75);
        assert_eq!(cfg.tracker.default_label, "Deep work");
    }

    #[test]
    fn apply_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("cycle.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.apply("cycle.auto_start_work", "maybe").is_err());
        assert!(!cfg.cycle.auto_start_work);
    }

    #[test]
    fn apply_rejects_invalid_values() {
        let mut cfg = Config::default();
        assert!(cfg.apply("cycle.focus_min", "0").is_err());
        assert_eq!(cfg.cycle.focus_min, 25);
    }

    #[test]
    fn rate_lookup_falls_back_to_default() {
        let mut cfg = Config::default();
        cfg.tracker.rates.insert("design".into(), 1500.0);
        assert_eq!(cfg.tracker.rate_for("design"), 1500.0);
        assert_eq!(cfg.tracker.rate_for("email"), 1000.0);
    }
}
