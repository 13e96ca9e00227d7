//! Agent identity value objects.
//!
//! # Identifiers
//! - [`AgentId`] - Opaque identifier of a participating agent

use serde::{Deserialize, Serialize};

/// Unique identifier for an agent.
///
/// Stable for the agent's lifetime. Ordering is lexicographic and is used
/// wherever the coordinator needs a deterministic tie-break (steal victim
/// selection, concurrent proposal ordering).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates an AgentId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
