//! Entries and Expiry
//!
//! An [`Entry`] is a value plus its expiration marker. Deadlines are wall-clock
//! [`SystemTime`]s rather than `Instant`s so that they keep their meaning after
//! being written to a snapshot and loaded by another process.
//!
//! Callers express lifetimes with [`Ttl`]. `Ttl::Never` is its own variant, so
//! "never expires" can't be confused with a zero or negative duration; a zero
//! duration is rejected as [`CacheError::InvalidTtl`].

use crate::error::{CacheError, Result};
use crate::storage::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Point-in-time copy of every live entry, keyed by cache key.
pub type Snapshot = HashMap<String, Entry>;

/// How long a value should live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ttl {
    /// The entry never expires.
    Never,
    /// The entry expires after the given (non-zero) duration.
    After(Duration),
}

/// Alias for [`Ttl::Never`].
pub const NEVER_EXPIRE: Ttl = Ttl::Never;

impl Ttl {
    pub fn secs(secs: u64) -> Self {
        Ttl::After(Duration::from_secs(secs))
    }

    pub fn millis(millis: u64) -> Self {
        Ttl::After(Duration::from_millis(millis))
    }

    /// Resolves the TTL into an absolute expiry relative to `now`.
    pub(crate) fn expiry_from(self, now: SystemTime) -> Result<Expiry> {
        match self {
            Ttl::Never => Ok(Expiry::Never),
            Ttl::After(d) if d.is_zero() => Err(CacheError::InvalidTtl),
            Ttl::After(d) => now
                .checked_add(d)
                .map(Expiry::At)
                .ok_or(CacheError::InvalidTtl),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Ttl::After(d)
    }
}

/// Absolute expiration marker of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expiry {
    Never,
    At(SystemTime),
}

impl Expiry {
    /// An entry is expired once the clock reaches its deadline.
    #[inline]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(deadline) => now >= *deadline,
        }
    }
}

/// A value together with its expiry, as exchanged with a persister.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// The stored value
    pub value: Value,
    /// When this entry expires
    pub expires_at: Expiry,
}

impl Entry {
    pub fn new(value: Value, expires_at: Expiry) -> Self {
        Self { value, expires_at }
    }

    /// Creates an entry that never expires.
    pub fn permanent(value: Value) -> Self {
        Self::new(value, Expiry::Never)
    }
}

/// A value in the timed partition. It always has a finite deadline.
#[derive(Debug, Clone)]
pub(crate) struct TimedEntry {
    pub(crate) value: Value,
    pub(crate) expires_at: SystemTime,
}

impl TimedEntry {
    #[inline]
    pub(crate) fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    /// Time left before the deadline, `None` once it has been reached.
    pub(crate) fn remaining_at(&self, now: SystemTime) -> Option<Duration> {
        self.expires_at
            .duration_since(now)
            .ok()
            .filter(|d| !d.is_zero())
    }

    pub(crate) fn to_entry(&self) -> Entry {
        Entry::new(self.value.clone(), Expiry::At(self.expires_at))
    }
}
