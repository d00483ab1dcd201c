//! In-memory snapshot persistence.
//!
//! Keeps the last saved snapshot in process memory. Clones share the same
//! slot, which lets one cache save and a second cache, opened later with a
//! clone, load what the first one left behind.

use crate::error::PersistError;
use crate::persist::{drop_expired, Persister};
use crate::storage::Snapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct Slot {
    snapshot: Mutex<Option<Snapshot>>,
    saves: AtomicU64,
}

/// A persister that keeps snapshots in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersister {
    slot: Arc<Slot>,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the last saved snapshot, if any.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.lock().clone()
    }

    /// Returns how many times `save` has been called successfully.
    pub fn saves(&self) -> u64 {
        self.slot.saves.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Snapshot>> {
        self.slot
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Persister for MemoryPersister {
    fn load(&self) -> Result<Snapshot, PersistError> {
        let mut items = self.lock().clone().unwrap_or_default();
        drop_expired(&mut items);
        Ok(items)
    }

    fn save(&self, items: &Snapshot) -> Result<(), PersistError> {
        *self.lock() = Some(items.clone());
        self.slot.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
