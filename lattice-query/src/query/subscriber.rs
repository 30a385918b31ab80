//! Observers of a coordinator's state.
//!
//! An observer is any consumer that needs to re-read the state when it
//! changes, usually a view scheduling a re-render. Callbacks take no
//! arguments: the observer asks the coordinator for the current state, which
//! is always the latest one even if several changes raced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

/// Unique identifier for a subscriber.
///
/// Returned by `subscribe` and used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Registry of change callbacks, notified in subscription order.
#[derive(Default)]
pub struct Observers {
    callbacks: RwLock<IndexMap<SubscriberId, Callback>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback and return its subscriber ID.
    pub fn subscribe<F>(&self, notify: F) -> SubscriberId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.callbacks.write().insert(id, Arc::new(notify));
        id
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.callbacks.write().shift_remove(&id).is_some()
    }

    /// Invoke every callback.
    ///
    /// The registry lock is released before any callback runs, so a callback
    /// may subscribe, unsubscribe or call back into its coordinator.
    pub fn notify(&self) {
        let callbacks: Vec<Callback> = self.callbacks.read().values().cloned().collect();
        for notify in callbacks {
            notify();
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn notifies_in_subscription_order() {
        let observers = Observers::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            observers.subscribe(move || order.lock().push(n));
        }

        observers.notify();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let observers = Observers::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let id = observers.subscribe(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        observers.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));

        observers.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(observers.is_empty());
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let observers = Arc::new(Observers::new());
        let slot: Arc<Mutex<Option<SubscriberId>>> = Arc::new(Mutex::new(None));

        let registry = observers.clone();
        let own_id = slot.clone();
        let id = observers.subscribe(move || {
            if let Some(id) = own_id.lock().take() {
                registry.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        observers.notify();
        assert!(observers.is_empty());
    }
}
