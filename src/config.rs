//! Cache Configuration
//!
//! The cache reads no environment variables or files; the host application
//! builds a [`CacheConfig`] and passes it to [`Cache::open`](crate::Cache::open).
//!
//! ```
//! use flashcache::CacheConfig;
//! use std::time::Duration;
//!
//! let config = CacheConfig::new()
//!     .cleanup_interval(Duration::from_secs(30))
//!     .persist_interval(Duration::from_secs(10));
//! assert!(config.validate(true).is_ok());
//! ```

use crate::error::{CacheError, Result};
use std::time::Duration;

/// Default interval between expiry sweeps
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default interval between snapshot saves
pub const DEFAULT_PERSIST_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Timers driving the background maintenance loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Interval between sweeps of expired entries (default: 5 minutes)
    pub cleanup_interval: Duration,

    /// Interval between snapshot saves when a persister is configured
    /// (default: 2 minutes)
    pub persist_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            persist_interval: DEFAULT_PERSIST_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with default intervals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interval between expiry sweeps.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Sets the interval between snapshot saves.
    pub fn persist_interval(mut self, interval: Duration) -> Self {
        self.persist_interval = interval;
        self
    }

    /// Checks that the intervals can drive the maintenance loop.
    ///
    /// `persist_interval` only matters when `persistence_enabled` is true.
    pub fn validate(&self, persistence_enabled: bool) -> Result<()> {
        if self.cleanup_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "cleanup_interval must be greater than zero".into(),
            ));
        }

        if persistence_enabled && self.persist_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "persist_interval must be greater than zero when a persister is configured".into(),
            ));
        }

        Ok(())
    }
}
