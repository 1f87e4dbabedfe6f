mod config;
pub mod database;
pub mod entry;
pub mod memory;
mod traits;

pub use config::{Config, CycleConfig, NotificationsConfig, TrackerConfig};
pub use database::Database;
pub use entry::{Entry, EntryId, EntryUpdate, NewEntry};
pub use memory::{MemoryEntryLog, MemoryStore};
pub use traits::{EntryLog, KvStore};

use std::path::PathBuf;

/// Returns `~/.config/worktally[-dev]/` based on WORKTALLY_ENV.
///
/// Set WORKTALLY_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("WORKTALLY_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("worktally-dev")
    } else {
        base_dir.join("worktally")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
