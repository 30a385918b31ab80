//! Async Request Coordinator
//!
//! The coordinator owns the lifecycle of "the current request" for one view.
//!
//! # How Requests Work
//!
//! 1. The view calls `request(key, resolver)` on every observation tick.
//!
//! 2. If `key` is cached, the state becomes `Loaded` with the cached payload
//!    and the resolver is not called.
//!
//! 3. If an attempt for `key` is already in flight, `key` becomes current
//!    again and the state is `Loading`. The resolver is not called again.
//!
//! 4. Otherwise a new attempt is issued: the state becomes `Loading`, the
//!    resolver is invoked once and its future is spawned on the runtime.
//!
//! 5. When the attempt settles, its outcome is applied only if its key is
//!    still current. A success is cached, a failure is not.
//!
//! # Superseded attempts
//!
//! Asking for another key does not cancel anything: the old future keeps
//! running and its outcome is dropped when it arrives. Asking for the old key
//! again while it is still in flight picks the attempt back up instead of
//! issuing a second one.
//!
//! A resolver that panics abandons its attempt. If its key was current the
//! state goes back to `Idle`, and the next request for the key retries it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, trace};

use super::cache::Cache;
use super::config::CoordinatorConfig;
use super::error::CoordinatorError;
use super::key::{AttemptId, RequestKey};
use super::resolver::Resolver;
use super::state::{Action, RequestState};
use super::subscriber::{Observers, SubscriberId};

/// Coordinates keyed async requests and memoizes their results.
///
/// Cloning is cheap and every clone drives the same state.
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = AsyncRequestCoordinator::new(CoordinatorConfig::named("pokedex"))?;
///
/// let state = coordinator.request("pikachu", &fetch_pokemon);
/// assert!(state.is_loading());
/// ```
pub struct AsyncRequestCoordinator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<T, E>>,
}

struct Inner<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Label for log events.
    name: String,

    /// Runtime that resolver futures are spawned on.
    runtime: Handle,

    /// Successful payloads, never evicted.
    cache: Cache<T>,

    /// Current key, in-flight attempts and state, updated together.
    slot: Mutex<Slot<T, E>>,

    /// Change callbacks.
    observers: Observers,

    /// Latest state for async observers.
    updates: watch::Sender<RequestState<T, E>>,

    /// Set once the consumer is gone. Completions are dropped from then on.
    disposed: AtomicBool,
}

/// A key is never both cached and in flight.
struct Slot<T, E> {
    current: Option<RequestKey>,
    in_flight: HashMap<RequestKey, AttemptId>,
    state: RequestState<T, E>,
}

impl<T, E> AsyncRequestCoordinator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a coordinator that spawns resolvers on the current tokio runtime.
    ///
    /// Fails with [`CoordinatorError::NoRuntime`] outside a runtime context.
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoordinatorError> {
        let runtime = Handle::try_current().map_err(|_| CoordinatorError::NoRuntime {
            name: config.name.clone(),
        })?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Create a coordinator that spawns resolvers on the given runtime.
    pub fn with_runtime(config: CoordinatorConfig, runtime: Handle) -> Self {
        let (updates, _) = watch::channel(RequestState::Idle);

        Self {
            inner: Arc::new(Inner {
                name: config.name,
                runtime,
                cache: Cache::with_capacity(config.cache_capacity),
                slot: Mutex::new(Slot {
                    current: None,
                    in_flight: HashMap::new(),
                    state: RequestState::Idle,
                }),
                observers: Observers::new(),
                updates,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// The name this coordinator logs under.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Observe `key`, starting work for it if needed, and return the state.
    ///
    /// Calling this repeatedly with the same key is cheap and side-effect
    /// free once the key is loaded or in flight. A key whose last attempt
    /// failed is retried. After [`dispose`](Self::dispose) this only returns
    /// the last state.
    pub fn request<K, R>(&self, key: K, resolver: &R) -> RequestState<T, E>
    where
        K: Into<RequestKey>,
        R: Resolver<T, E> + ?Sized,
    {
        let inner = &self.inner;
        let key = key.into();
        let mut slot = inner.slot.lock();

        if inner.is_disposed() {
            return slot.state.clone();
        }

        let already_current = slot.current.as_ref() == Some(&key);

        if let Some(data) = inner.cache.get(key.as_str()) {
            if already_current && slot.state.is_loaded() {
                trace!(coordinator = %inner.name, %key, "cache hit, state unchanged");
                return slot.state.clone();
            }

            trace!(coordinator = %inner.name, %key, "cache hit");
            slot.current = Some(key);
            let state = inner.dispatch(&mut slot, Action::Cached { data });
            drop(slot);

            inner.notify();
            return state;
        }

        if let Some(attempt) = slot.in_flight.get(&key).copied() {
            if already_current && slot.state.is_loading() {
                return slot.state.clone();
            }

            debug!(coordinator = %inner.name, %key, %attempt, "resuming in-flight attempt");
            slot.current = Some(key);
            let state = inner.dispatch(&mut slot, Action::Pending);
            drop(slot);

            inner.notify();
            return state;
        }

        let attempt = AttemptId::next();
        slot.in_flight.insert(key.clone(), attempt);
        slot.current = Some(key.clone());
        let state = inner.dispatch(&mut slot, Action::Pending);
        drop(slot);

        debug!(coordinator = %inner.name, %key, %attempt, "starting attempt");
        let pending = match panic::catch_unwind(AssertUnwindSafe(|| resolver.resolve(&key))) {
            Ok(pending) => pending,
            Err(payload) => {
                inner.abandon(&key, attempt, panic_message(payload.as_ref()));
                panic::resume_unwind(payload);
            }
        };

        let owner = Arc::clone(inner);
        inner.runtime.spawn(async move {
            match AssertUnwindSafe(pending).catch_unwind().await {
                Ok(outcome) => owner.settle(key, attempt, outcome),
                Err(payload) => owner.abandon(&key, attempt, panic_message(payload.as_ref())),
            }
        });

        inner.notify();
        state
    }

    /// The current state, without side effects.
    pub fn state(&self) -> RequestState<T, E> {
        self.inner.slot.lock().state.clone()
    }

    /// The key the current state belongs to.
    pub fn current_key(&self) -> Option<RequestKey> {
        self.inner.slot.lock().current.clone()
    }

    /// Whether a resolver call for `key` has not settled yet.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inner.slot.lock().in_flight.contains_key(key)
    }

    /// The payload cached for `key`, if any.
    pub fn cached(&self, key: &str) -> Option<T> {
        self.inner.cache.get(key)
    }

    /// Every key with a cached payload, sorted.
    pub fn cached_keys(&self) -> Vec<RequestKey> {
        self.inner.cache.keys()
    }

    /// Seed the cache for `key`, replacing any payload it already has.
    ///
    /// An attempt still in flight for `key` is superseded and its outcome
    /// dropped. If `key` is current the state becomes `Loaded` with `data`
    /// right away. Otherwise the next `request` for `key` is served from the
    /// cache.
    pub fn prime<K>(&self, key: K, data: T)
    where
        K: Into<RequestKey>,
    {
        let inner = &self.inner;
        let key = key.into();
        let mut slot = inner.slot.lock();

        debug!(coordinator = %inner.name, %key, "priming cache");
        inner.cache.insert(key.clone(), data.clone());
        if let Some(attempt) = slot.in_flight.remove(&key) {
            debug!(coordinator = %inner.name, %key, %attempt, "primed payload supersedes attempt");
        }

        if inner.is_disposed() || slot.current.as_ref() != Some(&key) {
            return;
        }

        inner.dispatch(&mut slot, Action::Cached { data });
        drop(slot);

        inner.notify();
    }

    /// Let go of the current key and return to `Idle`.
    ///
    /// Attempts still in flight keep running. Their outcomes are dropped unless
    /// their key is requested again before they settle.
    pub fn reset(&self) {
        let inner = &self.inner;
        let mut slot = inner.slot.lock();
        if inner.is_disposed() {
            return;
        }

        slot.current = None;
        inner.dispatch(&mut slot, Action::Reset);
        drop(slot);

        inner.notify();
    }

    /// Stop applying outcomes and notifying observers.
    ///
    /// For a consumer that is going away while requests are still in flight.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            debug!(coordinator = %self.inner.name, "disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Register a callback run after every state change.
    ///
    /// Callbacks run outside the coordinator's lock and may call back into it,
    /// typically to re-read [`state`](Self::state) or issue another request.
    ///
    /// The coordinator owns its callbacks. A callback holding a clone of the
    /// coordinator keeps both alive until it is unsubscribed. Capture a
    /// [`downgrade`](Self::downgrade)d handle instead to avoid that.
    pub fn subscribe<F>(&self, notify: F) -> SubscriberId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(notify)
    }

    /// Remove a callback. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    /// Get a receiver that always holds the latest state.
    pub fn watch(&self) -> watch::Receiver<RequestState<T, E>> {
        self.inner.updates.subscribe()
    }

    /// A handle that does not keep the coordinator alive.
    pub fn downgrade(&self) -> WeakCoordinator<T, E> {
        WeakCoordinator {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to an [`AsyncRequestCoordinator`].
///
/// Spawned attempts still hold the coordinator until they settle.
pub struct WeakCoordinator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    inner: Weak<Inner<T, E>>,
}

impl<T, E> WeakCoordinator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// The coordinator, if any strong handle to it is left.
    pub fn upgrade(&self) -> Option<AsyncRequestCoordinator<T, E>> {
        self.inner.upgrade().map(|inner| AsyncRequestCoordinator { inner })
    }
}

impl<T, E> Inner<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Apply `action` to the slot and publish the new state.
    ///
    /// Panics on an unhandled transition: the request bookkeeping only emits
    /// legal actions, so one reaching here is a bug, not a runtime condition.
    fn dispatch(&self, slot: &mut Slot<T, E>, action: Action<T, E>) -> RequestState<T, E> {
        let from_status = slot.state.status();

        // The slot keeps its state until the transition is known to be legal.
        match slot.state.clone().apply(action) {
            Ok(next) => {
                debug!(
                    coordinator = %self.name,
                    key = ?slot.current,
                    from = %from_status,
                    to = %next.status(),
                    "request state transition"
                );
                slot.state = next.clone();
                self.updates.send_replace(next.clone());
                next
            }
            Err(err) => {
                error!(coordinator = %self.name, key = ?slot.current, %err, "request state machine is inconsistent");
                panic!("coordinator '{}': {err}", self.name);
            }
        }
    }

    /// Apply the outcome of `attempt` if its key is still the current one.
    fn settle(&self, key: RequestKey, attempt: AttemptId, outcome: Result<T, E>) {
        let mut slot = self.slot.lock();

        if slot.in_flight.get(&key) != Some(&attempt) {
            trace!(coordinator = %self.name, %key, %attempt, "attempt superseded, outcome dropped");
            return;
        }
        slot.in_flight.remove(&key);

        if self.is_disposed() {
            debug!(coordinator = %self.name, %key, %attempt, "dropping outcome after dispose");
            return;
        }

        if slot.current.as_ref() != Some(&key) {
            debug!(
                coordinator = %self.name,
                %key,
                %attempt,
                current = ?slot.current,
                "dropping stale outcome"
            );
            return;
        }

        let action = match outcome {
            Ok(data) => {
                self.cache.insert(key.clone(), data.clone());
                Action::Resolved { data }
            }
            Err(error) => Action::Rejected { error },
        };
        debug!(coordinator = %self.name, %key, %attempt, outcome = action.name(), "attempt settled");

        self.dispatch(&mut slot, action);
        drop(slot);

        self.notify();
    }

    /// Forget `attempt` after its resolver panicked.
    fn abandon(&self, key: &RequestKey, attempt: AttemptId, reason: &str) {
        let mut slot = self.slot.lock();

        if slot.in_flight.get(key) != Some(&attempt) {
            return;
        }
        slot.in_flight.remove(key);
        error!(coordinator = %self.name, %key, %attempt, reason, "resolver panicked, attempt abandoned");

        if self.is_disposed() || slot.current.as_ref() != Some(key) {
            return;
        }

        slot.current = None;
        self.dispatch(&mut slot, Action::Reset);
        drop(slot);

        self.notify();
    }

    fn notify(&self) {
        if !self.is_disposed() {
            self.observers.notify();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl<T, E> Clone for AsyncRequestCoordinator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Clone for WeakCoordinator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T, E> Debug for WeakCoordinator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakCoordinator")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<T, E> Debug for AsyncRequestCoordinator<T, E>
where
    T: Clone + Send + Sync + Debug + 'static,
    E: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.inner.slot.lock();
        f.debug_struct("AsyncRequestCoordinator")
            .field("name", &self.inner.name)
            .field("current", &slot.current)
            .field("state", &slot.state)
            .field("in_flight", &slot.in_flight.len())
            .field("cached", &self.inner.cache.len())
            .field("disposed", &self.inner.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
