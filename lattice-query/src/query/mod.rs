//! Request Coordination
//!
//! This module implements the async request coordinator and the pieces it is
//! built from.
//!
//! # Concepts
//!
//! ## Request state
//!
//! A coordinator owns exactly one current [`RequestState`]. It moves through
//! `Idle → Loading → Loaded | Errored` via a total transition function over
//! [`Action`]s, so combinations such as "loading with an error" cannot be
//! represented.
//!
//! ## Attempts
//!
//! Every resolver invocation is an attempt tagged with the key it was issued
//! for and a fresh [`AttemptId`]. When an attempt settles, its outcome is only
//! applied if its key is still the current one. Otherwise it is dropped.
//!
//! ## Cache
//!
//! Successful payloads are memoized per key for the lifetime of the
//! coordinator. Failures are never cached, so asking again retries.
//!
//! # Implementation Notes
//!
//! The current key, the in-flight table and the state share one lock.
//! Observers are notified after that lock is released, which lets a callback
//! call back into the coordinator (a view re-rendering and requesting again).

mod cache;
mod config;
mod coordinator;
mod error;
mod key;
mod resolver;
mod state;
mod subscriber;

pub use cache::Cache;
pub use config::CoordinatorConfig;
pub use coordinator::{AsyncRequestCoordinator, WeakCoordinator};
pub use error::{CoordinatorError, TransitionError};
pub use key::{AttemptId, RequestKey};
pub use resolver::Resolver;
pub use state::{Action, RequestState, Status};
pub use subscriber::{Observers, SubscriberId};
