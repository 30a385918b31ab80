//! Request keys and attempt tags.

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies a logical request, e.g. a pokemon name.
///
/// Keys are compared by value and are cheap to clone, since the same key is
/// held by the cache, the in-flight table and every attempt issued for it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(Arc<str>);

impl RequestKey {
    /// Create a key from anything string-like.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// View the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestKey {
    fn from(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

impl From<String> for RequestKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl From<&RequestKey> for RequestKey {
    fn from(key: &RequestKey) -> Self {
        key.clone()
    }
}

impl Borrow<str> for RequestKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RequestKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Unique tag for one resolver invocation.
///
/// Issued from a process-wide counter, so two attempts never share an ID even
/// when they come from different coordinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl AttemptId {
    /// Issue the next attempt ID.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value, for logging.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn keys_compare_by_value() {
        let owned = RequestKey::from(String::from("pikachu"));
        let borrowed = RequestKey::from("pikachu");

        assert_eq!(owned, borrowed);
        assert_ne!(owned, RequestKey::new("bulbasaur"));
    }

    #[test]
    fn key_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(RequestKey::new("mew"), 151);

        assert_eq!(map.get("mew"), Some(&151));
        assert_eq!(map.get("mewtwo"), None);
    }

    #[test]
    fn key_formats_as_plain_string() {
        let key = RequestKey::new("charizard");
        assert_eq!(key.to_string(), "charizard");
        assert_eq!(format!("{key:?}"), "\"charizard\"");
    }

    #[test]
    fn attempt_ids_are_unique_and_increasing() {
        let a = AttemptId::next();
        let b = AttemptId::next();
        let c = AttemptId::next();

        assert!(a < b);
        assert!(b < c);
        assert_ne!(a, c);
    }
}
