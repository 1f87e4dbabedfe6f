#![allow(dead_code)]

use std::rc::Rc;
use std::sync::Arc;

use worktally_core::{
    Config, ManualClock, MemoryEntryLog, MemoryStore, RecordingNotifier, Session,
};

/// A session over in-memory collaborators and a manual clock.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Rc<MemoryStore>,
    pub log: Rc<MemoryEntryLog>,
    pub alerts: RecordingNotifier,
    pub session: Session,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let clock = Arc::new(ManualClock::default());
        let store = Rc::new(MemoryStore::new());
        let log = Rc::new(MemoryEntryLog::new());
        let alerts = RecordingNotifier::new();
        let session = Session::new(
            config,
            clock.clone(),
            Box::new(store.clone()),
            Box::new(log.clone()),
            Box::new(alerts.clone()),
        )
        .into_value();
        Self {
            clock,
            store,
            log,
            alerts,
            session,
        }
    }

    /// Build a second session over the same collaborators, as after a
    /// process restart.
    pub fn restart(&mut self, config: Config) {
        self.session = Session::new(
            config,
            self.clock.clone(),
            Box::new(self.store.clone()),
            Box::new(self.log.clone()),
            Box::new(self.alerts.clone()),
        )
        .into_value();
    }

    pub fn advance(&self, secs: i64) {
        self.clock.advance_secs(secs);
    }
}

/// Config with only the notification cadences under test switched on.
pub fn quiet_config() -> Config {
    let mut config = Config::default();
    config.notifications.lifecycle_sounds = false;
    config.cycle.sound_on_complete = false;
    config
}
