//! Typed Accessors
//!
//! The store keeps values type-erased as [`Value`]. The methods in this module
//! give callers a typed view over it: every read checks the stored kind against
//! the requested Rust type and reports [`CacheError::InvalidType`] on mismatch,
//! which callers can tell apart from [`CacheError::NotFound`].
//!
//! All of them go through the store's own read path, [`Store::set_value`] or
//! [`Store::mutate`] and take no locks of their own.
//!
//! ```
//! use flashcache::storage::{Store, Ttl};
//!
//! let store = Store::new();
//! store.set("hits", 0u64, Ttl::Never).unwrap();
//! store.increment("hits", 5u64).unwrap();
//! assert_eq!(store.get::<u64>("hits").unwrap(), 5);
//! assert!(store.get::<String>("hits").is_err());
//! ```

use crate::error::{CacheError, Result};
use crate::storage::entry::Ttl;
use crate::storage::store::Store;
use crate::storage::value::{CacheValue, Numeric, ScalarValue, Value, ValueKind};

fn invalid_type<T: CacheValue>(found: &Value) -> CacheError {
    CacheError::InvalidType {
        expected: T::kind(),
        found: found.kind(),
    }
}

fn mismatch(expected: ValueKind, found: ValueKind) -> CacheError {
    CacheError::InvalidType { expected, found }
}

impl Store {
    /// Gets the value for a key as type `T`.
    ///
    /// Sequences and maps are returned as owned copies, so the caller never
    /// holds a reference into the store.
    pub fn get<T: CacheValue>(&self, key: &str) -> Result<T> {
        self.read_entry(key, |value, _| {
            T::from_value_ref(value).ok_or_else(|| invalid_type::<T>(value))
        })?
    }

    /// Gets the value for a key as type `T` together with its remaining TTL.
    pub fn get_with_ttl<T: CacheValue>(&self, key: &str) -> Result<(T, Ttl)> {
        self.read_entry(key, |value, ttl| {
            T::from_value_ref(value)
                .map(|v| (v, ttl))
                .ok_or_else(|| invalid_type::<T>(value))
        })?
    }

    /// Sets a key to a typed value.
    pub fn set<T: CacheValue>(&self, key: &str, value: T, ttl: Ttl) -> Result<()> {
        self.set_value(key, value.into_value(), ttl)
    }

    /// Adds `delta` to a numeric value and returns the new value.
    ///
    /// The stored value must be exactly `T`. Integer overflow returns
    /// [`CacheError::Overflow`] and leaves the value unchanged.
    pub fn increment<T: Numeric>(&self, key: &str, delta: T) -> Result<T> {
        self.apply_numeric(key, |current: T| current.try_add(delta))
    }

    /// Subtracts `delta` from a numeric value and returns the new value.
    pub fn decrement<T: Numeric>(&self, key: &str, delta: T) -> Result<T> {
        self.apply_numeric(key, |current: T| current.try_sub(delta))
    }

    fn apply_numeric<T: Numeric>(&self, key: &str, op: impl FnOnce(T) -> Option<T>) -> Result<T> {
        self.mutate(key, |value| {
            let found = value.kind();
            let current = T::scalar_mut(value).ok_or_else(|| mismatch(T::kind(), found))?;
            let next = op(*current).ok_or(CacheError::Overflow)?;
            *current = next;
            Ok(next)
        })
    }

    /// Appends an element to a stored sequence of `T`.
    ///
    /// # Returns
    ///
    /// Returns the length of the sequence after the append.
    pub fn append<T: ScalarValue>(&self, key: &str, item: T) -> Result<usize> {
        self.mutate(key, |value| {
            let found = value.kind();
            let items = T::sequence_mut(value)
                .ok_or_else(|| mismatch(ValueKind::Sequence(T::KIND), found))?;
            items.push(item);
            Ok(items.len())
        })
    }

    /// Inserts a field into a stored map of `T`.
    ///
    /// # Returns
    ///
    /// Returns the previous value of the field, if any.
    pub fn map_insert<T: ScalarValue>(
        &self,
        key: &str,
        field: impl Into<String>,
        item: T,
    ) -> Result<Option<T>> {
        self.mutate(key, |value| {
            let found = value.kind();
            let fields = T::mapping_mut(value)
                .ok_or_else(|| mismatch(ValueKind::Mapping(T::KIND), found))?;
            Ok(fields.insert(field.into(), item))
        })
    }

    /// Removes a field from a stored map of `T`.
    ///
    /// # Returns
    ///
    /// Returns the removed value, or `None` if the field was not present.
    pub fn map_remove<T: ScalarValue>(&self, key: &str, field: &str) -> Result<Option<T>> {
        self.mutate(key, |value| {
            let found = value.kind();
            let fields = T::mapping_mut(value)
                .ok_or_else(|| mismatch(ValueKind::Mapping(T::KIND), found))?;
            Ok(fields.remove(field))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ScalarKind;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_typed_round_trip() {
        let store = Store::new();

        store.set("name", "Ariz".to_string(), Ttl::secs(5)).unwrap();
        store.set("flag", true, Ttl::Never).unwrap();
        store.set("ratio", 0.25f32, Ttl::Never).unwrap();
        store.set("raw", vec![1u8, 2, 3], Ttl::Never).unwrap();

        assert_eq!(store.get::<String>("name").unwrap(), "Ariz");
        assert!(store.get::<bool>("flag").unwrap());
        assert_eq!(store.get::<f32>("ratio").unwrap(), 0.25);
        assert_eq!(store.get::<Vec<u8>>("raw").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_wrong_type_is_distinct_from_missing() {
        let store = Store::new();

        store.set("key", 5i64, Ttl::Never).unwrap();

        match store.get::<String>("key") {
            Err(CacheError::InvalidType { expected, found }) => {
                assert_eq!(expected, String::kind());
                assert_eq!(found, i64::kind());
            }
            other => panic!("expected InvalidType, got {:?}", other),
        }
        assert!(matches!(store.get::<String>("missing"), Err(CacheError::NotFound)));
    }

    #[test]
    fn test_width_must_match_exactly() {
        let store = Store::new();

        store.set("n", 5i32, Ttl::Never).unwrap();

        assert_err!(store.get::<i64>("n"));
        assert_err!(store.increment("n", 1i64));
        assert_eq!(assert_ok!(store.increment("n", 1i32)), 6);
    }

    #[test]
    fn test_get_with_ttl() {
        let store = Store::new();

        store.set("p", 1u16, Ttl::Never).unwrap();
        store.set("t", 2u16, Ttl::secs(30)).unwrap();

        assert_eq!(store.get_with_ttl::<u16>("p").unwrap(), (1, Ttl::Never));

        let (value, ttl) = store.get_with_ttl::<u16>("t").unwrap();
        assert_eq!(value, 2);
        assert!(matches!(ttl, Ttl::After(d) if d <= Duration::from_secs(30)));

        assert!(matches!(
            store.get_with_ttl::<bool>("t"),
            Err(CacheError::InvalidType { .. })
        ));
    }

    #[test]
    fn test_increment_and_decrement() {
        let store = Store::new();

        store.set("counter", 10i64, Ttl::Never).unwrap();

        assert_eq!(store.increment("counter", 5i64).unwrap(), 15);
        assert_eq!(store.decrement("counter", 20i64).unwrap(), -5);
        assert_eq!(store.get::<i64>("counter").unwrap(), -5);

        store.set("float", 1.5f64, Ttl::Never).unwrap();
        assert_eq!(store.increment("float", 1.0f64).unwrap(), 2.5);
    }

    #[test]
    fn test_increment_missing_key() {
        let store = Store::new();

        assert!(matches!(
            store.increment("counter", 1i64),
            Err(CacheError::NotFound)
        ));
        assert!(!store.exists("counter"));
    }

    #[test]
    fn test_increment_overflow_leaves_value() {
        let store = Store::new();

        store.set("small", 250u8, Ttl::Never).unwrap();

        assert!(matches!(
            store.increment("small", 10u8),
            Err(CacheError::Overflow)
        ));
        assert_eq!(store.get::<u8>("small").unwrap(), 250);
        assert!(matches!(
            store.decrement("small", 251u8),
            Err(CacheError::Overflow)
        ));
    }

    #[test]
    fn test_increment_preserves_ttl() {
        let store = Store::new();

        store.set("counter", 0u32, Ttl::secs(100)).unwrap();
        store.increment("counter", 1u32).unwrap();

        assert!(matches!(store.get_ttl("counter").unwrap(), Ttl::After(_)));
        assert_eq!(store.get::<u32>("counter").unwrap(), 1);
    }

    #[test]
    fn test_append() {
        let store = Store::new();

        store.set("list", vec!["a".to_string()], Ttl::Never).unwrap();

        assert_eq!(store.append("list", "b".to_string()).unwrap(), 2);
        assert_eq!(
            store.get::<Vec<String>>("list").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );

        // A scalar string is not a sequence of strings
        store.set("text", "a".to_string(), Ttl::Never).unwrap();
        assert!(matches!(
            store.append("text", "b".to_string()),
            Err(CacheError::InvalidType { .. })
        ));
        // Neither is a sequence of another element type
        assert!(matches!(
            store.append("list", 1i64),
            Err(CacheError::InvalidType { .. })
        ));
    }

    #[test]
    fn test_map_insert_and_remove() {
        let store = Store::new();

        store
            .set("scores", HashMap::<String, i32>::new(), Ttl::secs(60))
            .unwrap();

        assert_eq!(store.map_insert("scores", "alice", 3i32).unwrap(), None);
        assert_eq!(store.map_insert("scores", "alice", 7i32).unwrap(), Some(3));
        assert_eq!(store.map_insert("scores", "bob", 1i32).unwrap(), None);

        let scores = store.get::<HashMap<String, i32>>("scores").unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores["alice"], 7);

        store.take_snapshot();
        assert_eq!(store.map_remove::<i32>("scores", "bob").unwrap(), Some(1));
        assert!(store.is_dirty());
        assert_eq!(store.map_remove::<i32>("scores", "bob").unwrap(), None);

        assert!(matches!(
            store.map_insert("scores", "carol", 1u32),
            Err(CacheError::InvalidType { .. })
        ));
        assert!(matches!(
            store.map_remove::<String>("scores", "alice"),
            Err(CacheError::InvalidType { .. })
        ));
    }

    #[test]
    fn test_mismatch_reports_container_kinds() {
        let store = Store::new();

        store.set("list", vec![1u16, 2], Ttl::Never).unwrap();
        store.set("n", 1i8, Ttl::Never).unwrap();

        match store.append("list", 3i32) {
            Err(CacheError::InvalidType { expected, found }) => {
                assert_eq!(expected, ValueKind::Sequence(ScalarKind::I32));
                assert_eq!(found, ValueKind::Sequence(ScalarKind::U16));
            }
            other => panic!("unexpected result {:?}", other),
        }

        match store.map_insert("n", "field", 1.0f32) {
            Err(CacheError::InvalidType { expected, found }) => {
                assert_eq!(expected, ValueKind::Mapping(ScalarKind::F32));
                assert_eq!(found, ValueKind::Scalar(ScalarKind::I8));
            }
            other => panic!("unexpected result {:?}", other),
        }

        match store.map_remove::<bool>("list", "field") {
            Err(CacheError::InvalidType { expected, .. }) => {
                assert_eq!(expected, ValueKind::Mapping(ScalarKind::Bool));
                assert_eq!(expected.to_string(), "{string: bool}");
            }
            other => panic!("unexpected result {:?}", other),
        }

        match store.decrement("n", 1i64) {
            Err(CacheError::InvalidType { expected, found }) => {
                assert_eq!(expected, ValueKind::Scalar(ScalarKind::I64));
                assert_eq!(found, ValueKind::Scalar(ScalarKind::I8));
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(store.get::<i8>("n").unwrap(), 1);
    }

    #[test]
    fn test_returned_copies_are_detached() {
        let store = Store::new();

        store.set("list", vec![1i64, 2], Ttl::Never).unwrap();
        let mut copy = store.get::<Vec<i64>>("list").unwrap();
        copy.push(3);

        assert_eq!(store.get::<Vec<i64>>("list").unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_increment() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 500;

        let store = Arc::new(Store::new());
        store.set("counter", 0u64, Ttl::Never).unwrap();

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        store.increment("counter", 1u64).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.get::<u64>("counter").unwrap(),
            (THREADS * PER_THREAD) as u64
        );
    }
}
