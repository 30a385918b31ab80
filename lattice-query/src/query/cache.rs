//! Result Cache
//!
//! Memoized payloads keyed by [`RequestKey`]. Entries are written only when an
//! attempt succeeds (or when a caller primes the cache) and are never evicted,
//! so the cache lives exactly as long as its coordinator.
//!
//! # Thread Safety
//!
//! Backed by a `DashMap`, so lookups from the view layer do not contend with
//! the coordinator's state lock.

use std::fmt::Debug;

use dashmap::DashMap;

use super::key::RequestKey;

/// A concurrent map of resolved payloads.
pub struct Cache<T>
where
    T: Clone + Send + Sync + 'static,
{
    entries: DashMap<RequestKey, T>,
}

impl<T> Cache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty cache with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
        }
    }

    /// Get a clone of the payload cached for `key`.
    pub fn get(&self, key: &str) -> Option<T> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Whether a payload is cached for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Store a payload, replacing any previous one for the same key.
    pub fn insert(&self, key: RequestKey, data: T) {
        self.entries.insert(key, data);
    }

    /// All cached keys, sorted so callers get a stable listing.
    pub fn keys(&self) -> Vec<RequestKey> {
        let mut keys: Vec<RequestKey> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Cache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for Cache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("keys", &self.keys())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
