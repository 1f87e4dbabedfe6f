//! In-memory collaborators.
//!
//! Used by tests and by embedders that do not want a database. Both can be
//! switched into an "unavailable" mode to exercise the soft-failure paths.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use super::entry::{Entry, EntryId, EntryUpdate, NewEntry};
use super::traits::{EntryLog, KvStore};
use crate::error::{EntryLogError, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
    unavailable: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.set(!available);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.values.borrow_mut().insert(key.to_string(), value.to_string());
    }
}

impl KvStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.unavailable.get() {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(self.values.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.unavailable.get() {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryEntryLog {
    entries: RefCell<Vec<Entry>>,
    unavailable: Cell<bool>,
    updates: Cell<usize>,
}

impl MemoryEntryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.set(!available);
    }

    /// Number of successful `update_entry` calls.
    pub fn update_count(&self) -> usize {
        self.updates.get()
    }

    pub fn all(&self) -> Vec<Entry> {
        self.entries.borrow().clone()
    }

    /// Append a finished entry directly, bypassing the provisional step.
    pub fn push(&self, entry: Entry) {
        self.entries.borrow_mut().push(entry);
    }

    fn check(&self) -> Result<(), EntryLogError> {
        if self.unavailable.get() {
            Err(EntryLogError::Unavailable("memory log switched off".into()))
        } else {
            Ok(())
        }
    }
}

impl EntryLog for MemoryEntryLog {
    fn create_entry(&self, entry: &NewEntry) -> Result<EntryId, EntryLogError> {
        self.check()?;
        let id = EntryId::generate();
        self.entries
            .borrow_mut()
            .push(Entry::provisional(id.clone(), entry));
        Ok(id)
    }

    fn update_entry(&self, id: &EntryId, update: &EntryUpdate) -> Result<(), EntryLogError> {
        self.check()?;
        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| EntryLogError::NotFound(id.to_string()))?;
        entry.apply(update);
        self.updates.set(self.updates.get() + 1);
        Ok(())
    }

    fn find_entry(&self, id: &EntryId) -> Result<Option<Entry>, EntryLogError> {
        self.check()?;
        Ok(self.entries.borrow().iter().find(|e| &e.id == id).cloned())
    }

    fn entries_on(&self, date: NaiveDate) -> Result<Vec<Entry>, EntryLogError> {
        self.check()?;
        Ok(self
            .entries
            .borrow()
            .iter()
            .filter(|e| e.date == date)
            .cloned()
            .collect())
    }

    fn set_earned(&self, id: &EntryId, earned: f64, at: DateTime<Utc>) -> Result<(), EntryLogError> {
        self.check()?;
        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| EntryLogError::NotFound(id.to_string()))?;
        entry.earned = earned;
        entry.updated_at = at;
        Ok(())
    }
}
