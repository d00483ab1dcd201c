//! Durable-Store Adapters
//!
//! A [`Persister`] loads the last snapshot when a cache is opened and
//! saves fresh snapshots for the maintenance loop. The cache only knows this
//! trait; where the bytes go is up to the implementation.
//!
//! ## Implementations
//!
//! - [`FilePersister`]: a single snapshot file, replaced atomically on save
//! - [`MemoryPersister`]: keeps the last snapshot in memory; clones share it
//!
//! ## Contract
//!
//! - `load` treats "nothing saved yet" as an empty snapshot, not an error, and
//!   never returns entries whose deadline has already passed.
//! - `save` replaces the stored snapshot with exactly the given entries.
//!
//! Both run on a blocking thread when called from the maintenance loop, so
//! they may do synchronous I/O.

pub mod file;
pub mod memory;

pub use file::FilePersister;
pub use memory::MemoryPersister;

use crate::error::PersistError;
use crate::storage::Snapshot;
use std::time::SystemTime;

/// Loads and saves cache snapshots.
pub trait Persister: Send + Sync + 'static {
    /// Returns every previously saved entry that has not yet expired.
    fn load(&self) -> Result<Snapshot, PersistError>;

    /// Replaces the saved snapshot with `items`.
    fn save(&self, items: &Snapshot) -> Result<(), PersistError>;
}

/// Drops entries whose deadline has passed, returning how many were dropped.
pub(crate) fn drop_expired(items: &mut Snapshot) -> usize {
    let now = SystemTime::now();
    let before = items.len();
    items.retain(|_, entry| !entry.expires_at.is_expired_at(now));
    before - items.len()
}
