//! # flashcache - An In-Process Key-Value Cache
//!
//! flashcache is a local, in-memory key-value cache with per-entry expiry,
//! type-checked access and optional snapshot persistence. There is no network
//! hop: the cache lives inside your process and is shared through an `Arc`.
//!
//! ## Features
//!
//! - **Typed Access**: Store strings, booleans, fixed-width numbers, and
//!   homogeneous sequences or string-keyed maps of them. Reads with the wrong
//!   type fail with `InvalidType` instead of panicking
//! - **TTL Support**: Entries either never expire or expire after a duration
//! - **Background Maintenance**: A Tokio task sweeps expired entries and saves
//!   snapshots when the cache changed
//! - **Snapshots**: Optionally survive restarts through a pluggable
//!   [`Persister`]; a file-backed one is included
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              Cache                                  │
//! │                                                                     │
//! │   callers ──> typed accessors ──> ┌──────────────────────────────┐  │
//! │                                   │            Store             │  │
//! │                                   │  permanent │ timed │ dirty   │  │
//! │                                   │        (one RwLock)          │  │
//! │                                   └──────────────────────────────┘  │
//! │                                               ▲                     │
//! │                                               │ sweep / snapshot    │
//! │                     ┌─────────────────────────┴───────────────────┐ │
//! │                     │              Maintenance                    │ │
//! │                     │         (Background Tokio Task)             │ │
//! │                     └─────────────────────────┬───────────────────┘ │
//! │                                               ▼                     │
//! │                                          Persister                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use flashcache::{Cache, CacheConfig, FilePersister, Ttl};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> flashcache::Result<()> {
//!     let config = CacheConfig::new()
//!         .cleanup_interval(Duration::from_secs(30))
//!         .persist_interval(Duration::from_secs(10));
//!
//!     // Loads the previous snapshot, if any
//!     let cache = Cache::with_persister(config, FilePersister::new("cache.snap"))?;
//!
//!     cache.set("user:1:name", "Ariz".to_string(), Ttl::Never)?;
//!     cache.set("user:1:visits", 0u64, Ttl::secs(3600))?;
//!     cache.increment("user:1:visits", 1u64)?;
//!
//!     // Saves a final snapshot
//!     cache.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: Store, value model, typed accessors and maintenance loop
//! - [`persist`]: The `Persister` trait and its file and memory implementations
//! - [`config`]: Maintenance timer configuration
//! - [`error`]: Error types
//!
//! ## Design Highlights
//!
//! ### Two Partitions
//!
//! Entries that never expire and entries with a deadline live in separate
//! maps, so the expiry sweep only walks the entries that can expire.
//!
//! ### Closed Value Set
//!
//! Values are a tagged union, so snapshots are self-describing and need no
//! global registration of storable types.

pub mod cache;
pub mod config;
pub mod error;
pub mod persist;
pub mod storage;

// Re-export commonly used types for convenience
pub use cache::Cache;
pub use config::CacheConfig;
pub use error::{CacheError, PersistError, Result};
pub use persist::{FilePersister, MemoryPersister, Persister};
pub use storage::{
    CacheValue, Entry, Expiry, Numeric, ScalarValue, Snapshot, Store, Ttl, Value, ValueKind,
    NEVER_EXPIRE,
};

/// Version of flashcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
