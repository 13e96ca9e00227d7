//! Phase states of an epoch

use serde::{Deserialize, Serialize};

/// Regime the system is in during an epoch
///
/// Transitions only move forward (`Contested → Converging → Stable`) and
/// reset to `Contested` when a new epoch opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    /// Proposals compete, little agreement
    #[default]
    Contested,
    /// Agreement is rising and work is flowing
    Converging,
    /// Agreement is high and load is balanced; the epoch may close
    Stable,
}

impl PhaseState {
    pub fn as_str(&self) -> &str {
        match self {
            PhaseState::Contested => "contested",
            PhaseState::Converging => "converging",
            PhaseState::Stable => "stable",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            PhaseState::Contested => "Contested",
            PhaseState::Converging => "Converging",
            PhaseState::Stable => "Stable",
        }
    }

    /// The state a forward transition leads to, if any
    pub fn next(&self) -> Option<PhaseState> {
        match self {
            PhaseState::Contested => Some(PhaseState::Converging),
            PhaseState::Converging => Some(PhaseState::Stable),
            PhaseState::Stable => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseState::Stable)
    }
}

impl std::fmt::Display for PhaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A forward move between two phase states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: PhaseState,
    pub to: PhaseState,
}

impl std::fmt::Display for PhaseTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only() {
        assert_eq!(PhaseState::Contested.next(), Some(PhaseState::Converging));
        assert_eq!(PhaseState::Converging.next(), Some(PhaseState::Stable));
        assert_eq!(PhaseState::Stable.next(), None);
        assert!(PhaseState::Contested < PhaseState::Stable);
    }

    #[test]
    fn test_display() {
        let transition = PhaseTransition {
            from: PhaseState::Contested,
            to: PhaseState::Converging,
        };
        assert_eq!(transition.to_string(), "Contested -> Converging");
        assert_eq!(PhaseState::Stable.as_str(), "stable");
    }
}
