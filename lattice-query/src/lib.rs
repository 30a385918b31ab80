//! Lattice Query
//!
//! This crate provides keyed async request coordination for Lattice views.
//! It implements:
//!
//! - A single-owner request state machine (idle, loading, loaded, errored)
//! - Per-key memoization of successful results
//! - At-most-one in-flight resolver call per key
//! - A stale-response guard so superseded results never reach the view
//!
//! The view layer calls [`query::AsyncRequestCoordinator::request`] on every
//! observation tick and re-reads the state whenever the coordinator notifies
//! it of a change. Resolvers are plain async functions of a key.
//!
//! # Architecture
//!
//! - `query`: the coordinator, its state machine, cache and observers
//! - `fetch`: helpers for resolvers that decode JSON response envelopes
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_query::query::{AsyncRequestCoordinator, CoordinatorConfig, RequestKey};
//!
//! let pokedex = AsyncRequestCoordinator::<Pokemon, FetchError>::new(CoordinatorConfig::default())?;
//! let fetch = |key: RequestKey| async move { fetch_pokemon(&key).await };
//!
//! // First observation starts the fetch.
//! assert!(pokedex.request("pikachu", &fetch).is_loading());
//!
//! // Later observations see the settled state; repeats hit the cache.
//! let mut updates = pokedex.watch();
//! updates.wait_for(|state| state.is_settled()).await?;
//! ```

pub mod fetch;
pub mod query;
