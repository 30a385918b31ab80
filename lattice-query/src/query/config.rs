//! Coordinator configuration.

use serde::Deserialize;

use super::error::CoordinatorError;

/// Configuration for an [`AsyncRequestCoordinator`](super::AsyncRequestCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Label attached to every log event from this coordinator.
    pub name: String,

    /// Initial capacity of the result cache. The cache still grows unbounded.
    pub cache_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: "query".to_string(),
            cache_capacity: 16,
        }
    }
}

impl CoordinatorConfig {
    /// Create a config with the given name and default settings otherwise.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CoordinatorError> {
        Ok(serde_json::from_str(json)?)
    }
}
