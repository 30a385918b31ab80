//! Coordinator error types.
//!
//! Resolver failures are not errors of the coordinator: they become the
//! `Errored` state and never surface here.

use thiserror::Error;

use super::state::Status;

/// Errors raised while building or configuring a coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// No tokio runtime was available to run resolver futures on.
    #[error("no tokio runtime available for coordinator '{name}'")]
    NoRuntime { name: String },

    /// The configuration could not be parsed.
    #[error("invalid coordinator config: {0}")]
    Config(#[from] serde_json::Error),
}

/// An action was applied to a state that has no transition for it.
///
/// Internal consistency failure: the coordinator treats it as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("unhandled transition: '{action}' from {from}")]
    Unhandled { from: Status, action: &'static str },
}
