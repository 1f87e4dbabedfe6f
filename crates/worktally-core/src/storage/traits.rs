use std::rc::Rc;

use chrono::{DateTime, NaiveDate, Utc};

use super::entry::{Entry, EntryId, EntryUpdate, NewEntry};
use crate::error::{EntryLogError, StoreError};

/// Durable key-value store holding engine state across restarts.
pub trait KvStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Append-only log of time entries owned outside the engine.
pub trait EntryLog {
    /// Store a provisional entry and return its id.
    fn create_entry(&self, entry: &NewEntry) -> Result<EntryId, EntryLogError>;

    /// Finalize an entry. Clears its provisional flag.
    fn update_entry(&self, id: &EntryId, update: &EntryUpdate) -> Result<(), EntryLogError>;

    fn find_entry(&self, id: &EntryId) -> Result<Option<Entry>, EntryLogError>;

    /// All entries dated `date`, oldest first.
    fn entries_on(&self, date: NaiveDate) -> Result<Vec<Entry>, EntryLogError>;

    /// Manual earnings step, done by the user after a timed run.
    fn set_earned(&self, id: &EntryId, earned: f64, at: DateTime<Utc>) -> Result<(), EntryLogError>;
}

impl<T: KvStore + ?Sized> KvStore for Rc<T> {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).save(key, value)
    }
}

impl<T: EntryLog + ?Sized> EntryLog for Rc<T> {
    fn create_entry(&self, entry: &NewEntry) -> Result<EntryId, EntryLogError> {
        (**self).create_entry(entry)
    }

    fn update_entry(&self, id: &EntryId, update: &EntryUpdate) -> Result<(), EntryLogError> {
        (**self).update_entry(id, update)
    }

    fn find_entry(&self, id: &EntryId) -> Result<Option<Entry>, EntryLogError> {
        (**self).find_entry(id)
    }

    fn entries_on(&self, date: NaiveDate) -> Result<Vec<Entry>, EntryLogError> {
        (**self).entries_on(date)
    }

    fn set_earned(&self, id: &EntryId, earned: f64, at: DateTime<Utc>) -> Result<(), EntryLogError> {
        (**self).set_earned(id, earned, at)
    }
}
