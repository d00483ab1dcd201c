//! Storage Module
//!
//! This module provides the core storage functionality for flashcache:
//! a thread-safe, two-partition store with TTL support, the typed accessors
//! on top of it, and the background maintenance loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │   ┌─────────────────────┐      ┌─────────────────────┐      │
//! │   │  permanent          │      │  timed              │      │
//! │   │  (never expire)     │      │  (with deadline)    │      │
//! │   └─────────────────────┘      └─────────────────────┘      │
//! │                 one RwLock + dirty flag                     │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │       Maintenance         │
//!              │  (Background Tokio Task)  │
//!              │  sweep + snapshot         │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Typed Access**: Values are stored type-erased and checked on every read
//! - **TTL Support**: Keys can live forever or expire after a duration
//! - **No Lazy Delete**: Reads hide expired keys without touching the maps
//! - **Active Expiry**: The maintenance loop sweeps expired keys
//! - **Dirty Tracking**: Snapshots are only saved when something changed
//!
//! ## Example
//!
//! ```
//! use flashcache::storage::{Store, Ttl};
//! use std::time::Duration;
//!
//! let store = Store::new();
//!
//! // Basic operations
//! store.set("name", "Ariz".to_string(), Ttl::Never).unwrap();
//! assert_eq!(store.get::<String>("name").unwrap(), "Ariz");
//!
//! // Set with TTL
//! store
//!     .set("session", vec![1u8, 2, 3], Ttl::After(Duration::from_secs(3600)))
//!     .unwrap();
//! assert!(store.exists("session"));
//! ```

pub mod entry;
pub mod maintenance;
pub mod store;
pub mod typed;
pub mod value;

// Re-export commonly used types
pub use entry::{Entry, Expiry, Snapshot, Ttl, NEVER_EXPIRE};
pub use maintenance::{Maintenance, Persistence};
pub use store::Store;
pub use value::{
    CacheValue, Mapping, Numeric, Scalar, ScalarKind, ScalarValue, Sequence, Value, ValueKind,
};
