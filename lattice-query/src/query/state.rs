//! Request State Machine
//!
//! The observable status of "the current attempt" and the transition function
//! that drives it.
//!
//! # Transitions
//!
//! | from \ action | Pending | Resolved | Rejected | Cached | Reset |
//! |---------------|---------|----------|----------|--------|-------|
//! | Idle          | Loading | -        | -        | Loaded | Idle  |
//! | Loading       | Loading | Loaded   | Errored  | Loaded | Idle  |
//! | Loaded        | Loading | -        | -        | Loaded | Idle  |
//! | Errored       | Loading | -        | -        | Loaded | Idle  |
//!
//! A `-` entry is an unhandled transition. The coordinator never produces one,
//! so reaching it means the bookkeeping around attempts is broken.

use std::fmt;

use serde::Serialize;

use super::error::TransitionError;

/// Coarse status of a [`RequestState`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Idle,
    Loading,
    Loaded,
    Errored,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Loading => "loading",
            Status::Loaded => "loaded",
            Status::Errored => "errored",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state of the current request attempt.
///
/// Serializes as `{"status": "...", ...}` with the payload inlined, which is
/// what diagnostics tooling expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RequestState<T, E> {
    /// No attempt has been made.
    Idle,

    /// An attempt is in flight. Any earlier payload has been cleared.
    Loading,

    /// The attempt succeeded (or the payload came from the cache).
    Loaded { data: T },

    /// The attempt failed. The error is the resolver's, untouched.
    Errored { error: E },
}

impl<T, E> RequestState<T, E> {
    pub fn status(&self) -> Status {
        match self {
            RequestState::Idle => Status::Idle,
            RequestState::Loading => Status::Loading,
            RequestState::Loaded { .. } => Status::Loaded,
            RequestState::Errored { .. } => Status::Errored,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RequestState::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, RequestState::Loading)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, RequestState::Loaded { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, RequestState::Errored { .. })
    }

    /// Whether the attempt has reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.is_loaded() || self.is_errored()
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            RequestState::Loaded { data } => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            RequestState::Errored { error } => Some(error),
            _ => None,
        }
    }

    /// Apply an action, producing the next state.
    ///
    /// Consumes the current state: every successful transition replaces the
    /// whole value, so a stale payload can never linger next to a new status.
    pub fn apply(self, action: Action<T, E>) -> Result<Self, TransitionError> {
        match (self, action) {
            (_, Action::Pending) => Ok(RequestState::Loading),
            (_, Action::Reset) => Ok(RequestState::Idle),
            (_, Action::Cached { data }) => Ok(RequestState::Loaded { data }),
            (RequestState::Loading, Action::Resolved { data }) => Ok(RequestState::Loaded { data }),
            (RequestState::Loading, Action::Rejected { error }) => {
                Ok(RequestState::Errored { error })
            }
            (from, action) => Err(TransitionError::Unhandled {
                from: from.status(),
                action: action.name(),
            }),
        }
    }
}

impl<T, E> Default for RequestState<T, E> {
    fn default() -> Self {
        RequestState::Idle
    }
}

/// An input to the request state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<T, E> {
    /// A new attempt was issued (or an in-flight one became current again).
    Pending,

    /// The current attempt resolved with a payload.
    Resolved { data: T },

    /// The current attempt failed.
    Rejected { error: E },

    /// The payload was served from the cache without an attempt.
    Cached { data: T },

    /// The consumer let go of the current request.
    Reset,
}

impl<T, E> Action<T, E> {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Pending => "pending",
            Action::Resolved { .. } => "resolved",
            Action::Rejected { .. } => "rejected",
            Action::Cached { .. } => "cached",
            Action::Reset => "reset",
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    type State = RequestState<u32, String>;

    fn every_state() -> Vec<State> {
        vec![
            RequestState::Idle,
            RequestState::Loading,
            RequestState::Loaded { data: 1 },
            RequestState::Errored { error: "boom".into() },
        ]
    }

    #[test]
    fn starts_idle() {
        let state = State::default();
        assert!(state.is_idle());
        assert_eq!(state.status(), Status::Idle);
        assert!(!state.is_settled());
    }

    #[test]
    fn pending_is_legal_from_every_state() {
        for state in every_state() {
            let next = state.apply(Action::Pending).unwrap();
            assert_eq!(next, RequestState::Loading);
        }
    }

    #[test]
    fn cached_is_legal_from_every_state() {
        for state in every_state() {
            let next = state.apply(Action::Cached { data: 25 }).unwrap();
            assert_eq!(next, RequestState::Loaded { data: 25 });
        }
    }

    #[test]
    fn reset_returns_to_idle() {
        for state in every_state() {
            assert!(state.apply(Action::Reset).unwrap().is_idle());
        }
    }

    #[test]
    fn loading_settles_either_way() {
        let loaded = State::Loading.apply(Action::Resolved { data: 25 }).unwrap();
        assert_eq!(loaded.data(), Some(&25));
        assert!(loaded.is_settled());

        let errored = State::Loading
            .apply(Action::Rejected { error: "not found".into() })
            .unwrap();
        assert_eq!(errored.error().map(String::as_str), Some("not found"));
        assert!(errored.data().is_none());
    }

    #[test]
    fn settling_outside_loading_is_unhandled() {
        for state in every_state().into_iter().filter(|s| !s.is_loading()) {
            let from = state.status();

            let err = state.clone().apply(Action::Resolved { data: 1 }).unwrap_err();
            assert_eq!(err, TransitionError::Unhandled { from, action: "resolved" });

            let err = state.apply(Action::Rejected { error: "x".into() }).unwrap_err();
            assert_eq!(err, TransitionError::Unhandled { from, action: "rejected" });
        }
    }

    #[test]
    fn new_attempt_clears_previous_payload() {
        let loaded = State::Loaded { data: 7 };
        let next = loaded.apply(Action::Pending).unwrap();
        assert!(next.data().is_none());
        assert!(next.error().is_none());
    }

    #[test]
    fn serializes_with_status_tag() {
        let loaded = State::Loaded { data: 25 };
        let json = serde_json::to_value(&loaded).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "loaded", "data": 25 }));

        let idle = serde_json::to_value(State::Idle).unwrap();
        assert_eq!(idle, serde_json::json!({ "status": "idle" }));
    }
}
