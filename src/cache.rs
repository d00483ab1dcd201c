//! The Cache Handle
//!
//! [`Cache`] ties the pieces together: it loads the last snapshot through the
//! persister, seeds a [`Store`] from it, starts the maintenance loop, and
//! saves a final snapshot when closed.
//!
//! ```text
//!   Cache::open ──load──> Persister
//!        │
//!        ├──> Arc<Store> <──────────── callers (get / set / increment ...)
//!        │        ▲
//!        │        │ sweep + snapshot
//!        └──> Maintenance ──save──> Persister
//! ```
//!
//! `Cache` dereferences to [`Store`], so every store and typed accessor is
//! available directly on the handle.

use crate::config::CacheConfig;
use crate::error::Result;
use crate::persist::Persister;
use crate::storage::maintenance::{Maintenance, Persistence};
use crate::storage::Store;
use std::ops::Deref;
use std::sync::Arc;
use tracing::info;

/// An in-process cache with background expiry and optional persistence.
///
/// # Example
///
/// ```
/// use flashcache::{Cache, CacheConfig, Ttl};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> flashcache::Result<()> {
/// let cache = Cache::new(CacheConfig::default())?;
///
/// cache.set("visits", 0i64, Ttl::Never)?;
/// cache.increment("visits", 1i64)?;
/// assert_eq!(cache.get::<i64>("visits")?, 1);
///
/// cache.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Cache {
    store: Arc<Store>,
    persistence: Option<Persistence>,
    maintenance: Option<Maintenance>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("store", &self.store)
            .field("persistence", &self.persistence)
            .finish()
    }
}

impl Cache {
    /// Opens a cache without persistence.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::open(config, None)
    }

    /// Opens a cache backed by `persister`.
    pub fn with_persister<P: Persister>(config: CacheConfig, persister: P) -> Result<Self> {
        Self::open(config, Some(Arc::new(persister)))
    }

    /// Opens a cache.
    ///
    /// If a persister is given, its snapshot is loaded synchronously before
    /// this returns; a load failure aborts construction. The maintenance loop
    /// is spawned on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn open(config: CacheConfig, persister: Option<Arc<dyn Persister>>) -> Result<Self> {
        config.validate(persister.is_some())?;

        let store = match &persister {
            Some(persister) => {
                let snapshot = persister.load()?;
                info!(entries = snapshot.len(), "Cache opened from snapshot");
                Store::from_snapshot(snapshot)
            }
            None => {
                info!("Cache opened without persistence");
                Store::new()
            }
        };
        let store = Arc::new(store);

        let persistence =
            persister.map(|persister| Persistence::new(persister, config.persist_interval));
        let maintenance = Maintenance::start(
            Arc::clone(&store),
            config.cleanup_interval,
            persistence.clone(),
        );

        Ok(Self {
            store,
            persistence,
            maintenance: Some(maintenance),
        })
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Saves a snapshot right away, outside the persist timer.
    ///
    /// Unlike saves made by the maintenance loop, a failure here is returned
    /// to the caller. The store stays dirty after a failure. Flushes and
    /// persist ticks never overlap, so a flush can't be overwritten by an
    /// older snapshot. Without a persister this is a no-op.
    pub async fn flush(&self) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };

        persistence.persist_now(&self.store).await?;
        Ok(())
    }

    /// Stops the maintenance loop and waits for the final snapshot.
    ///
    /// Dropping the cache also stops the loop, but without waiting for the
    /// final save to complete.
    pub async fn close(mut self) {
        if let Some(maintenance) = self.maintenance.take() {
            maintenance.shutdown().await;
        }
        info!("Cache closed");
    }
}

impl Deref for Cache {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}
