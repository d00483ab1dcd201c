//! Thread-Safe Two-Partition Store
//!
//! This module implements the core storage structure of flashcache.
//!
//! ## Design Decisions
//!
//! 1. **Two Partitions**: Entries that never expire live in `permanent`, entries
//!    with a deadline live in `timed`. The sweeper only ever walks `timed`.
//! 2. **Partition by Type**: `permanent` holds bare values and `timed` holds
//!    values with a deadline, so a key can't sit in the wrong partition.
//! 3. **One RwLock**: Both partitions and the dirty flag sit behind a single
//!    `RwLock`. Readers share it, every mutation takes it exclusively.
//! 4. **No Lazy Delete**: Reads treat an expired-but-unswept entry as absent
//!    and never modify the maps; removal is the sweeper's job.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                        Store                         │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │                RwLock<Partitions>              │  │
//! │  │  ┌──────────────┐ ┌──────────────┐ ┌───────┐   │  │
//! │  │  │  permanent   │ │    timed     │ │ dirty │   │  │
//! │  │  │ key -> Value │ │ key -> Value │ │ bool  │   │  │
//! │  │  │              │ │   + deadline │ │       │   │  │
//! │  │  └──────────────┘ └──────────────┘ └───────┘   │  │
//! │  └────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! No I/O ever happens while the lock is held; the maintenance loop copies a
//! snapshot out and saves it after releasing the lock.

use crate::error::{CacheError, Result};
use crate::storage::entry::{Entry, Expiry, Snapshot, TimedEntry, Ttl};
use crate::storage::value::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

/// The state guarded by the store lock.
#[derive(Debug, Default)]
struct Partitions {
    /// Entries that never expire
    permanent: HashMap<String, Value>,
    /// Entries with a finite deadline
    timed: HashMap<String, TimedEntry>,
    /// True iff the store changed since the last snapshot was taken
    dirty: bool,
    /// Bumped by every mutation
    version: u64,
}

impl Partitions {
    fn touch(&mut self) {
        self.dirty = true;
        self.version = self.version.wrapping_add(1);
    }

    /// Looks up a live entry and its remaining lifetime.
    fn live(&self, key: &str, now: SystemTime) -> Option<(&Value, Ttl)> {
        if let Some(value) = self.permanent.get(key) {
            return Some((value, Ttl::Never));
        }

        let entry = self.timed.get(key)?;
        let remaining = entry.remaining_at(now)?;
        Some((&entry.value, Ttl::After(remaining)))
    }

    fn live_mut(&mut self, key: &str, now: SystemTime) -> Option<&mut Value> {
        if self.permanent.contains_key(key) {
            return self.permanent.get_mut(key);
        }

        self.timed
            .get_mut(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| &mut entry.value)
    }

    fn remove(&mut self, key: &str) -> bool {
        self.permanent.remove(key).is_some() || self.timed.remove(key).is_some()
    }

    fn snapshot(&self, now: SystemTime) -> Snapshot {
        let mut items = Snapshot::with_capacity(self.permanent.len() + self.timed.len());

        for (key, value) in &self.permanent {
            items.insert(key.clone(), Entry::permanent(value.clone()));
        }

        for (key, entry) in &self.timed {
            if !entry.is_expired_at(now) {
                items.insert(key.clone(), entry.to_entry());
            }
        }

        items
    }
}

/// Concurrency-safe home for all cache entries.
///
/// This struct is designed to be wrapped in an `Arc` and shared between
/// callers and the maintenance loop. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use flashcache::storage::{Store, Ttl, Value};
///
/// let store = Store::new();
///
/// store.set_value("name", Value::from_typed("Ariz".to_string()), Ttl::Never).unwrap();
/// assert!(store.exists("name"));
///
/// store.set_value("session", Value::from_typed(42u64), Ttl::secs(60)).unwrap();
/// assert_eq!(store.count(true), 2);
/// ```
pub struct Store {
    inner: RwLock<Partitions>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts = self.read();
        f.debug_struct("Store")
            .field("permanent", &parts.permanent.len())
            .field("timed", &parts.timed.len())
            .field("dirty", &parts.dirty)
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Partitions::default()),
        }
    }

    /// Creates a store seeded from a loaded snapshot.
    ///
    /// Entries whose deadline has already passed are dropped. The new store
    /// starts clean.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let now = SystemTime::now();
        let mut parts = Partitions::default();

        for (key, entry) in snapshot {
            match entry.expires_at {
                Expiry::Never => {
                    parts.permanent.insert(key, entry.value);
                }
                Expiry::At(deadline) if now >= deadline => {}
                Expiry::At(expires_at) => {
                    parts.timed.insert(
                        key,
                        TimedEntry {
                            value: entry.value,
                            expires_at,
                        },
                    );
                }
            }
        }

        Self {
            inner: RwLock::new(parts),
        }
    }

    // Every critical section leaves the maps consistent, so a panic while the
    // lock was held does not invalidate the data.
    fn read(&self) -> RwLockReadGuard<'_, Partitions> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Partitions> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks if a key exists and has not expired.
    pub fn exists(&self, key: &str) -> bool {
        self.read().live(key, SystemTime::now()).is_some()
    }

    /// Runs `f` on a live value and its remaining lifetime under the read lock.
    pub(crate) fn read_entry<R>(&self, key: &str, f: impl FnOnce(&Value, Ttl) -> R) -> Result<R> {
        let parts = self.read();
        let (value, ttl) = parts
            .live(key, SystemTime::now())
            .ok_or(CacheError::NotFound)?;
        Ok(f(value, ttl))
    }

    /// Gets a copy of the raw value for a key.
    ///
    /// Returns `NotFound` if the key doesn't exist or has expired.
    pub fn get_value(&self, key: &str) -> Result<Value> {
        self.read_entry(key, |value, _| value.clone())
    }

    /// Gets the remaining lifetime of a key.
    ///
    /// Permanent entries report [`Ttl::Never`]. A timed entry whose deadline
    /// has passed reports `NotFound` even if it hasn't been swept yet.
    pub fn get_ttl(&self, key: &str) -> Result<Ttl> {
        self.read_entry(key, |_, ttl| ttl)
    }

    /// Sets a key to a value with the given lifetime.
    ///
    /// Any previous value is replaced regardless of its type. Switching a key
    /// between [`Ttl::Never`] and a finite TTL moves it between partitions in
    /// a single critical section.
    pub fn set_value(&self, key: &str, value: Value, ttl: Ttl) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        let expiry = ttl.expiry_from(SystemTime::now())?;

        let mut parts = self.write();
        match expiry {
            Expiry::Never => {
                parts.timed.remove(key);
                parts.permanent.insert(key.to_owned(), value);
            }
            Expiry::At(expires_at) => {
                parts.permanent.remove(key);
                parts
                    .timed
                    .insert(key.to_owned(), TimedEntry { value, expires_at });
            }
        }
        parts.touch();

        Ok(())
    }

    /// Deletes a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key was deleted, `false` if it didn't exist.
    pub fn delete(&self, key: &str) -> bool {
        let mut parts = self.write();
        let removed = parts.remove(key);
        if removed {
            parts.touch();
        }
        removed
    }

    /// Deletes multiple keys under one lock acquisition.
    ///
    /// # Returns
    ///
    /// Returns the number of keys that were deleted.
    pub fn delete_many<K: AsRef<str>>(&self, keys: &[K]) -> usize {
        let mut parts = self.write();
        let deleted = keys
            .iter()
            .filter(|key| parts.remove(key.as_ref()))
            .count();
        if deleted > 0 {
            parts.touch();
        }
        deleted
    }

    /// Applies `f` to the live value of `key` in place.
    ///
    /// The entry keeps its partition and deadline. `f` must leave the value
    /// untouched when it returns an error; the store is only marked dirty on
    /// success.
    pub fn mutate<R>(&self, key: &str, f: impl FnOnce(&mut Value) -> Result<R>) -> Result<R> {
        let now = SystemTime::now();
        let mut parts = self.write();

        let value = parts.live_mut(key, now).ok_or(CacheError::NotFound)?;
        let out = f(value)?;
        parts.touch();

        Ok(out)
    }

    /// Counts entries.
    ///
    /// With `include_expired = true` this is O(1) and includes timed entries
    /// that have expired but not been swept. With `false` it scans the timed
    /// partition, so prefer the cheap form on hot paths.
    pub fn count(&self, include_expired: bool) -> usize {
        let parts = self.read();
        if include_expired {
            return parts.permanent.len() + parts.timed.len();
        }

        let now = SystemTime::now();
        let live_timed = parts
            .timed
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count();
        parts.permanent.len() + live_timed
    }

    /// Returns the number of stored entries, expired-but-unswept included.
    pub fn len(&self) -> usize {
        self.count(true)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every live key, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        let parts = self.read();
        let now = SystemTime::now();

        parts
            .permanent
            .keys()
            .chain(
                parts
                    .timed
                    .iter()
                    .filter(|(_, entry)| !entry.is_expired_at(now))
                    .map(|(key, _)| key),
            )
            .cloned()
            .collect()
    }

    /// Returns whether the store changed since the last snapshot was taken.
    pub fn is_dirty(&self) -> bool {
        self.read().dirty
    }

    /// Returns a copy of every live entry, both partitions merged.
    pub fn snapshot_unexpired(&self) -> Snapshot {
        self.read().snapshot(SystemTime::now())
    }

    /// Removes every timed entry whose deadline has passed.
    ///
    /// # Returns
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut parts = self.write();

        let before = parts.timed.len();
        parts.timed.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - parts.timed.len();

        if removed > 0 {
            parts.touch();
        }
        removed
    }

    /// Takes a snapshot and clears the dirty flag, or returns `None` if the
    /// store is clean.
    ///
    /// The copy is made under the read lock. The flag is only cleared if no
    /// mutation landed between the copy and the clear; otherwise the store
    /// stays dirty and the next persist tick picks the change up.
    pub(crate) fn take_dirty_snapshot(&self) -> Option<Snapshot> {
        let (snapshot, version) = self.copy_if_dirty()?;
        self.clear_dirty_if_unchanged(version);
        Some(snapshot)
    }

    /// Takes a snapshot whether or not the store is dirty.
    pub(crate) fn take_snapshot(&self) -> Snapshot {
        let (snapshot, version) = {
            let parts = self.read();
            (parts.snapshot(SystemTime::now()), parts.version)
        };
        self.clear_dirty_if_unchanged(version);
        snapshot
    }

    fn copy_if_dirty(&self) -> Option<(Snapshot, u64)> {
        let parts = self.read();
        if !parts.dirty {
            return None;
        }
        Some((parts.snapshot(SystemTime::now()), parts.version))
    }

    /// Clears the dirty flag if the store is still at `version`.
    fn clear_dirty_if_unchanged(&self, version: u64) -> bool {
        let mut parts = self.write();
        if parts.version != version {
            return false;
        }
        parts.dirty = false;
        true
    }

    /// Flags the store as changed, e.g. after a snapshot failed to save.
    pub(crate) fn mark_dirty(&self) {
        self.write().touch();
    }
}
