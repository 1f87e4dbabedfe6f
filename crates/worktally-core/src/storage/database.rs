//! SQLite-backed storage.
//!
//! One database file serves both collaborators of the engine:
//! - `kv` table: durable key-value store for tracker, cycle and cadence state
//! - `entries` table: the time-entry log

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::data_dir;
use super::entry::{Entry, EntryId, EntryUpdate, NewEntry};
use super::traits::{EntryLog, KvStore};
use crate::error::{DatabaseError, EntryLogError, StoreError};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M:%S";

const ENTRY_COLUMNS: &str =
    "id, date, start, end, duration_hours, earned, rate, label, description, provisional, created_at, updated_at";

/// SQLite database for engine state and time entries.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/worktally/worktally.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open() -> Result<Self, DatabaseError> {
        let dir = data_dir().map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Self::open_at(&dir.join("worktally.db"))
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS entries (
                    id              TEXT PRIMARY KEY,
                    date            TEXT NOT NULL,
                    start           TEXT NOT NULL,
                    end             TEXT,
                    duration_hours  REAL NOT NULL DEFAULT 0,
                    earned          REAL NOT NULL DEFAULT 0,
                    rate            REAL NOT NULL DEFAULT 0,
                    label           TEXT NOT NULL,
                    description     TEXT NOT NULL DEFAULT '',
                    provisional     INTEGER NOT NULL DEFAULT 0,
                    created_at      TEXT NOT NULL,
                    updated_at      TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_entries_date ON entries(date);
                CREATE INDEX IF NOT EXISTS idx_entries_provisional ON entries(provisional);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn insert_provisional(&self, fields: &NewEntry) -> Result<EntryId, DatabaseError> {
        let id = EntryId::generate();
        let created_at = fields.at.to_rfc3339();
        self.conn.execute(
            "INSERT INTO entries (id, date, start, end, duration_hours, earned, rate, label, description, provisional, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, 0, 0, ?4, ?5, ?6, 1, ?7, ?7)",
            params![
                id.as_str(),
                fields.date.format(DATE_FMT).to_string(),
                fields.start.format(TIME_FMT).to_string(),
                fields.rate,
                fields.label,
                fields.description,
                created_at,
            ],
        )?;
        Ok(id)
    }

    /// Returns the number of rows touched.
    pub fn finalize_entry(&self, id: &EntryId, update: &EntryUpdate) -> Result<usize, DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE entries SET end = ?2, duration_hours = ?3, provisional = 0, updated_at = ?4
             WHERE id = ?1",
            params![
                id.as_str(),
                update.end.format(TIME_FMT).to_string(),
                update.duration_hours,
                update.at.to_rfc3339(),
            ],
        )?;
        Ok(changed)
    }

    pub fn update_earned(&self, id: &EntryId, earned: f64, at: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE entries SET earned = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.as_str(), earned, at.to_rfc3339()],
        )?;
        Ok(changed)
    }

    pub fn entry(&self, id: &EntryId) -> Result<Option<Entry>, DatabaseError> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1");
        let raw = self
            .conn
            .query_row(&sql, params![id.as_str()], RawEntry::from_row)
            .optional()?;
        raw.map(RawEntry::decode).transpose()
    }

    pub fn entries_for_date(&self, date: NaiveDate) -> Result<Vec<Entry>, DatabaseError> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE date = ?1 ORDER BY start, created_at");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![date.format(DATE_FMT).to_string()], RawEntry::from_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.decode()?);
        }
        Ok(entries)
    }

    /// Timer-created entries that were never finalized.
    pub fn provisional_entries(&self) -> Result<Vec<Entry>, DatabaseError> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE provisional = 1 ORDER BY date, start");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], RawEntry::from_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.decode()?);
        }
        Ok(entries)
    }
}

/// Row as stored; text columns are parsed in `decode`.
struct RawEntry {
    id: String,
    date: String,
    start: String,
    end: Option<String>,
    duration_hours: f64,
    earned: f64,
    rate: f64,
    label: String,
    description: String,
    provisional: bool,
    created_at: String,
    updated_at: String,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            date: row.get(1)?,
            start: row.get(2)?,
            end: row.get(3)?,
            duration_hours: row.get(4)?,
            earned: row.get(5)?,
            rate: row.get(6)?,
            label: row.get(7)?,
            description: row.get(8)?,
            provisional: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn decode(self) -> Result<Entry, DatabaseError> {
        let malformed = |message: String| DatabaseError::MalformedRow {
            table: "entries".into(),
            message,
        };
        let time = |s: &str| {
            NaiveTime::parse_from_str(s, TIME_FMT).map_err(|e| malformed(format!("time '{s}': {e}")))
        };
        let stamp = |s: &str| {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| malformed(format!("timestamp '{s}': {e}")))
        };

        Ok(Entry {
            date: NaiveDate::parse_from_str(&self.date, DATE_FMT)
                .map_err(|e| malformed(format!("date '{}': {e}", self.date)))?,
            start: time(&self.start)?,
            end: self.end.as_deref().map(time).transpose()?,
            duration_hours: self.duration_hours,
            earned: self.earned,
            rate: self.rate,
            provisional: self.provisional,
            created_at: stamp(&self.created_at)?,
            updated_at: stamp(&self.updated_at)?,
            id: EntryId::from(self.id),
            label: self.label,
            description: self.description,
        })
    }
}

impl KvStore for Database {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.kv_get(key)?)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(self.kv_set(key, value)?)
    }
}

impl EntryLog for Database {
    fn create_entry(&self, entry: &NewEntry) -> Result<EntryId, EntryLogError> {
        Ok(self.insert_provisional(entry)?)
    }

    fn update_entry(&self, id: &EntryId, update: &EntryUpdate) -> Result<(), EntryLogError> {
        match self.finalize_entry(id, update)? {
            0 => Err(EntryLogError::NotFound(id.to_string())),
            _ => Ok(()),
        }
    }

    fn find_entry(&self, id: &EntryId) -> Result<Option<Entry>, EntryLogError> {
        Ok(self.entry(id)?)
    }

    fn entries_on(&self, date: NaiveDate) -> Result<Vec<Entry>, EntryLogError> {
        Ok(self.entries_for_date(date)?)
    }

    fn set_earned(&self, id: &EntryId, earned: f64, at: DateTime<Utc>) -> Result<(), EntryLogError> {
        match self.update_earned(id, earned, at)? {
            0 => Err(EntryLogError::NotFound(id.to_string())),
            _ => Ok(()),
        }
    }
}
