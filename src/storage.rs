//! In-memory key/value storage shared by all connections.
//!
//! A single mutex guards the whole map, so every operation is atomic with
//! respect to every other operation. No I/O happens while the lock is held.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, trace};

/// Result of a storage operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreResult {
    /// Value was written
    Stored,
    /// Key already exists; carries the value it currently holds
    Exists(String),
    /// Key does not exist
    NotFound,
    /// Key was removed
    Deleted,
}

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct Store {
    data: Mutex<HashMap<String, String>>,
}

impl Store {
    /// Create a new store pre-populated with the given entries
    pub fn new<I, K, V>(seed: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let data: HashMap<String, String> = seed
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        info!(entries = data.len(), "Initializing store");

        Arc::new(Self {
            data: Mutex::new(data),
        })
    }

    // Each operation is a single map call, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the current value of a key
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Insert a value only if the key is absent
    pub fn create(&self, key: &str, value: &str) -> StoreResult {
        let mut data = self.lock();
        if let Some(existing) = data.get(key) {
            return StoreResult::Exists(existing.clone());
        }
        data.insert(key.to_string(), value.to_string());
        trace!(key, "Item created");
        StoreResult::Stored
    }

    /// Overwrite a value only if the key is present
    pub fn update(&self, key: &str, value: &str) -> StoreResult {
        let mut data = self.lock();
        match data.get_mut(key) {
            Some(slot) => {
                *slot = value.to_string();
                trace!(key, "Item updated");
                StoreResult::Stored
            }
            None => StoreResult::NotFound,
        }
    }

    /// Remove a key
    pub fn delete(&self, key: &str) -> StoreResult {
        if self.lock().remove(key).is_some() {
            trace!(key, "Item deleted");
            StoreResult::Deleted
        } else {
            StoreResult::NotFound
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn empty() -> Arc<Store> {
        Store::new(Vec::<(String, String)>::new())
    }

    #[test]
    fn test_seeded_store() {
        let store = Store::new([("first", "42")]);
        assert_eq!(store.get("first").as_deref(), Some("42"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = empty();
        assert!(store.get("nonexistent").is_none());
    }

    #[test]
    fn test_create_then_get() {
        let store = empty();

        let result = store.create("key1", "value1");
        assert_eq!(result, StoreResult::Stored);
        assert_eq!(store.get("key1").as_deref(), Some("value1"));
    }

    #[test]
    fn test_create_existing() {
        let store = empty();
        store.create("key1", "value1");

        let result = store.create("key1", "value2");
        assert_eq!(result, StoreResult::Exists("value1".to_string()));

        // Value should remain unchanged
        assert_eq!(store.get("key1").as_deref(), Some("value1"));
    }

    #[test]
    fn test_update_existing() {
        let store = empty();
        store.create("key1", "value1");

        let result = store.update("key1", "value2");
        assert_eq!(result, StoreResult::Stored);
        assert_eq!(store.get("key1").as_deref(), Some("value2"));
    }

    #[test]
    fn test_update_nonexistent() {
        let store = empty();

        let result = store.update("key1", "value1");
        assert_eq!(result, StoreResult::NotFound);
        assert!(store.get("key1").is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_delete() {
        let store = empty();
        store.create("key1", "value1");

        assert_eq!(store.delete("key1"), StoreResult::Deleted);
        assert!(store.get("key1").is_none());
        assert_eq!(store.delete("key1"), StoreResult::NotFound);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_concurrent_distinct_keys() {
        let store = empty();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.create(&format!("key{i}"), &format!("value{i}")))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), StoreResult::Stored);
        }

        assert_eq!(store.len(), 32);
        for i in 0..32 {
            assert_eq!(store.get(&format!("key{i}")), Some(format!("value{i}")));
        }
    }

    #[test]
    fn test_concurrent_create_same_key() {
        let store = empty();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.create("contended", &format!("writer{i}")))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let stored = results
            .iter()
            .filter(|r| **r == StoreResult::Stored)
            .count();
        assert_eq!(stored, 1);

        // Every loser saw the winner's value
        let winner = store.get("contended").unwrap();
        for result in results {
            match result {
                StoreResult::Stored => {}
                StoreResult::Exists(value) => assert_eq!(value, winner),
                other => panic!("unexpected: {:?}", other),
            }
        }
    }
}
