//! Synchronization with the external entry log.
//!
//! A provisional entry is created when tracking starts and finalized when it
//! stops. Failed finalizations are queued and retried on later ticks.

mod entry_sync;

pub use entry_sync::{EntrySynchronizer, PendingFinalize, FINALIZE_RETRY_SECS, MAX_FINALIZE_ATTEMPTS};
