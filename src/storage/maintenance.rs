//! Background Maintenance Loop
//!
//! This module implements the background task that keeps the store tidy and,
//! when a persister is configured, durable.
//!
//! ## Design
//!
//! The loop runs as a single Tokio task that selects over three events:
//!
//! 1. **Shutdown**: the handle was stopped or dropped. The loop saves one final
//!    snapshot (dirty or not) and exits.
//! 2. **Cleanup tick**: expired entries are swept out of the timed partition.
//! 3. **Persist tick**: only armed with a persister. If the store changed since
//!    the last snapshot, a copy is taken under the lock and saved on the
//!    blocking pool after the lock is released.
//!
//! Neither timer fires at startup, and ticks missed while a save was running
//! are delayed rather than replayed in a burst.
//!
//! ## Failed Saves
//!
//! A failed save is logged and not retried within the same tick. The store is
//! flagged dirty again, so the next persist tick tries again even if nothing
//! else changes in the meantime.
//!
//! ## Save Ordering
//!
//! Every save, whether from a tick, the final shutdown save or
//! [`Cache::flush`](crate::Cache::flush), holds the [`Persistence`] save lock
//! from taking the snapshot until the persister returns. Snapshots therefore
//! reach the persister in the order they were taken, and a newer snapshot
//! can't be overwritten by an older one.

use crate::error::PersistError;
use crate::persist::Persister;
use crate::storage::{Snapshot, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Where and how often the maintenance loop saves snapshots.
///
/// Clones share the save lock, so a clone handed to the loop and one kept
/// for explicit flushes never save concurrently.
#[derive(Clone)]
pub struct Persistence {
    /// Destination of the snapshots
    persister: Arc<dyn Persister>,
    /// Interval between persist ticks
    interval: Duration,
    /// Held from snapshot to completed save
    save_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Persistence {
    pub fn new(persister: Arc<dyn Persister>, interval: Duration) -> Self {
        Self {
            persister,
            interval,
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Interval between persist ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    async fn persist_if_dirty(&self, store: &Store) {
        let _guard = self.save_lock.lock().await;

        match store.take_dirty_snapshot() {
            Some(snapshot) => {
                if let Err(e) = self.save(store, snapshot).await {
                    warn!(error = %e, "Failed to persist snapshot");
                }
            }
            None => trace!("Store unchanged, skipping snapshot"),
        }
    }

    /// Takes and saves a snapshot whether or not the store is dirty.
    ///
    /// The store is flagged dirty again if the save fails.
    pub(crate) async fn persist_now(&self, store: &Store) -> Result<(), PersistError> {
        let _guard = self.save_lock.lock().await;

        let snapshot = store.take_snapshot();
        self.save(store, snapshot).await
    }

    async fn save(&self, store: &Store, snapshot: Snapshot) -> Result<(), PersistError> {
        let result = save_snapshot(&self.persister, snapshot).await;
        if result.is_err() {
            store.mark_dirty();
        }
        result
    }
}

/// A handle to the running maintenance loop.
///
/// When this handle is dropped, the loop is signalled to stop. Use
/// [`Maintenance::shutdown`] to also wait for the final snapshot.
#[derive(Debug)]
pub struct Maintenance {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
    /// The spawned loop, taken by `shutdown`
    handle: Option<JoinHandle<()>>,
}

impl Maintenance {
    /// Starts the maintenance loop as a background task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, or if either interval is
    /// zero. [`CacheConfig::validate`](crate::CacheConfig::validate) rejects
    /// zero intervals up front.
    pub fn start(
        store: Arc<Store>,
        cleanup_interval: Duration,
        persistence: Option<Persistence>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            cleanup_interval_ms = cleanup_interval.as_millis() as u64,
            persist_interval_ms = persistence.as_ref().map(|p| p.interval().as_millis() as u64),
            "Background maintenance started"
        );

        let handle = tokio::spawn(maintenance_loop(
            store,
            cleanup_interval,
            persistence,
            shutdown_rx,
        ));

        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Signals the loop to stop without waiting for it.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops the loop and waits for its final snapshot to be saved.
    pub async fn shutdown(mut self) {
        self.stop();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Maintenance task ended abnormally");
            }
        }

        info!("Background maintenance stopped");
    }
}

impl Drop for Maintenance {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main maintenance loop.
async fn maintenance_loop(
    store: Arc<Store>,
    cleanup_interval: Duration,
    persistence: Option<Persistence>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut cleanup = ticker(cleanup_interval);
    let mut persist = persistence.as_ref().map(|p| ticker(p.interval()));

    loop {
        tokio::select! {
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Maintenance loop received shutdown signal");
                    break;
                }
            }
            _ = cleanup.tick() => {
                let removed = store.cleanup_expired();
                if removed > 0 {
                    debug!(
                        removed = removed,
                        entries_remaining = store.len(),
                        "Expired entries cleaned up"
                    );
                } else {
                    trace!("No expired entries");
                }
            }
            _ = next_tick(&mut persist) => {
                if let Some(persistence) = &persistence {
                    persistence.persist_if_dirty(&store).await;
                }
            }
        }
    }

    if let Some(persistence) = &persistence {
        if let Err(e) = persistence.persist_now(&store).await {
            warn!(error = %e, "Failed to persist final snapshot");
        }
    }
}

/// An interval whose first tick is one period from now.
fn ticker(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Waits for the next tick, or forever when the timer is disabled.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Saves a snapshot on the blocking pool.
async fn save_snapshot(
    persister: &Arc<dyn Persister>,
    snapshot: Snapshot,
) -> Result<(), PersistError> {
    let persister = Arc::clone(persister);
    let count = snapshot.len();

    tokio::task::spawn_blocking(move || persister.save(&snapshot))
        .await
        .map_err(|e| PersistError::Task(e.to_string()))??;

    debug!(count, "Snapshot persisted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryPersister;
    use crate::storage::{Ttl, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A persister whose saves always fail.
    #[derive(Default)]
    struct FailingPersister {
        attempts: AtomicUsize,
    }

    impl Persister for FailingPersister {
        fn load(&self) -> Result<Snapshot, PersistError> {
            Ok(Snapshot::new())
        }

        fn save(&self, _items: &Snapshot) -> Result<(), PersistError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(PersistError::Io(std::io::Error::other("disk full")))
        }
    }

    fn persistence(persister: Arc<dyn Persister>, interval: Duration) -> Option<Persistence> {
        Some(Persistence::new(persister, interval))
    }

    fn text(s: &str) -> Value {
        Value::from_typed(s.to_string())
    }

    #[tokio::test]
    async fn test_loop_cleans_expired_keys() {
        let store = Arc::new(Store::new());

        // Add some keys with short TTL
        for i in 0..10 {
            store
                .set_value(&format!("key{}", i), text("value"), Ttl::millis(50))
                .unwrap();
        }

        // Add a permanent key
        store.set_value("permanent", text("value"), Ttl::Never).unwrap();

        assert_eq!(store.len(), 11);

        let _maintenance =
            Maintenance::start(Arc::clone(&store), Duration::from_millis(10), None);

        // Wait for keys to expire and be cleaned up
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Only the permanent key should remain
        assert_eq!(store.len(), 1);
        assert!(store.exists("permanent"));
    }

    #[tokio::test]
    async fn test_loop_stops_on_drop() {
        let store = Arc::new(Store::new());

        {
            let _maintenance =
                Maintenance::start(Arc::clone(&store), Duration::from_millis(10), None);
            tokio::time::sleep(Duration::from_millis(50)).await;
            // Loop is signalled here
        }

        // Add keys after the loop is stopped
        store.set_value("key", text("value"), Ttl::millis(10)).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        // The key is expired but nothing swept it
        assert!(!store.exists("key"));
        assert_eq!(store.count(true), 1);
    }

    #[tokio::test]
    async fn test_persist_tick_only_saves_when_dirty() {
        let store = Arc::new(Store::new());
        let persister = MemoryPersister::new();

        store.set_value("key", text("value"), Ttl::Never).unwrap();

        let maintenance = Maintenance::start(
            Arc::clone(&store),
            Duration::from_secs(60),
            persistence(Arc::new(persister.clone()), Duration::from_millis(20)),
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(persister.saves(), 1);
        assert!(!store.is_dirty());

        store.set_value("other", text("value"), Ttl::secs(60)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(persister.saves(), 2);

        let saved = persister.snapshot().expect("snapshot saved");
        assert_eq!(saved.len(), 2);

        maintenance.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_saves_final_snapshot_even_when_clean() {
        let store = Arc::new(Store::new());
        let persister = MemoryPersister::new();

        let maintenance = Maintenance::start(
            Arc::clone(&store),
            Duration::from_secs(60),
            persistence(Arc::new(persister.clone()), Duration::from_secs(60)),
        );

        assert!(!store.is_dirty());
        maintenance.shutdown().await;

        assert_eq!(persister.saves(), 1);
        assert_eq!(persister.snapshot().map(|s| s.len()), Some(0));
    }

    #[tokio::test]
    async fn test_shutdown_without_persister() {
        let store = Arc::new(Store::new());
        store.set_value("key", text("value"), Ttl::Never).unwrap();

        let maintenance = Maintenance::start(Arc::clone(&store), Duration::from_secs(60), None);
        maintenance.shutdown().await;

        // No snapshot was taken, so the store is still dirty
        assert!(store.is_dirty());
    }

    #[tokio::test]
    async fn test_failed_save_restores_dirty_flag() {
        let store = Arc::new(Store::new());
        let persister = Arc::new(FailingPersister::default());

        store.set_value("key", text("value"), Ttl::Never).unwrap();

        let maintenance = Maintenance::start(
            Arc::clone(&store),
            Duration::from_secs(60),
            persistence(persister.clone(), Duration::from_millis(20)),
        );

        tokio::time::sleep(Duration::from_millis(150)).await;

        // Every persist tick retried because the flag was restored
        assert!(persister.attempts.load(Ordering::SeqCst) >= 2);
        assert!(store.is_dirty());

        maintenance.shutdown().await;
        assert!(store.is_dirty());
    }
}
