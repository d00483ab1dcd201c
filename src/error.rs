//! Error Types
//!
//! Two error enums cover everything the cache can report:
//!
//! - [`CacheError`] is returned by every accessor and by cache construction.
//!   `NotFound` and `InvalidType` are ordinary outcomes for a TTL cache, since
//!   a key can expire between any two calls.
//! - [`PersistError`] is returned by [`Persister`](crate::persist::Persister)
//!   implementations. It reaches callers only through `Cache::open` (a failed
//!   load) and `Cache::flush`; the maintenance loop logs and swallows it.

use crate::storage::ValueKind;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;

/// Errors returned by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is absent, or present but past its deadline.
    #[error("key not found")]
    NotFound,

    /// The key holds a value of a different type than the one requested.
    #[error("invalid type: expected {expected}, found {found}")]
    InvalidType {
        /// Type the caller asked for
        expected: ValueKind,
        /// Type actually stored under the key
        found: ValueKind,
    },

    /// Keys must be non-empty strings.
    #[error("key must not be empty")]
    EmptyKey,

    /// A finite TTL must be strictly positive and representable as a deadline.
    #[error("ttl must be a positive duration (use Ttl::Never for entries that never expire)")]
    InvalidTtl,

    /// An integer increment or decrement would overflow.
    #[error("arithmetic overflow")]
    Overflow,

    /// The cache configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Loading or saving a snapshot failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Errors that can occur while loading or saving a snapshot.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Reading or writing the durable store failed
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot payload could not be encoded or decoded
    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    /// The snapshot is shorter than its header
    #[error("snapshot is truncated")]
    Truncated,

    /// The file does not start with the snapshot magic bytes
    #[error("not a snapshot file (bad magic bytes)")]
    BadMagic,

    /// The snapshot was written by an incompatible format version
    #[error("unsupported snapshot format version {found} (expected {expected})")]
    UnsupportedVersion { expected: u8, found: u8 },

    /// The blocking task running the save panicked or was cancelled
    #[error("snapshot task failed: {0}")]
    Task(String),
}
