//! Domain error types

use crate::agent::AgentId;
use crate::epoch::ProposalId;
use crate::scheduler::TaskId;
use thiserror::Error;

/// Domain-level errors
///
/// Two families share this enum:
/// - protocol errors: caller mistakes, reported synchronously and never
///   retried by the coordinator
/// - empty-result conditions: not failures, the caller polls or backs off
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("Agent already registered: {0}")]
    AgentAlreadyRegistered(AgentId),

    #[error("Unknown proposal: {0}")]
    UnknownProposal(ProposalId),

    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Epoch {submitted} is closed (current epoch is {current})")]
    EpochClosed { submitted: u64, current: u64 },

    #[error("Vote weight {0} is outside [0, 1]")]
    InvalidWeight(f64),

    #[error("Agent {agent} did not author proposal {proposal}")]
    NotProposalAuthor { agent: AgentId, proposal: ProposalId },

    #[error("No agents registered")]
    NoAgents,
}

impl DomainError {
    /// Check if this error is a caller mistake
    pub fn is_protocol_error(&self) -> bool {
        !self.is_empty_result()
    }

    /// Check if this error is an empty-result condition the caller should poll on
    pub fn is_empty_result(&self) -> bool {
        matches!(self, DomainError::NoAgents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_closed_display() {
        let error = DomainError::EpochClosed {
            submitted: 3,
            current: 4,
        };
        assert_eq!(
            error.to_string(),
            "Epoch 3 is closed (current epoch is 4)"
        );
    }

    #[test]
    fn test_error_families() {
        assert!(DomainError::NoAgents.is_empty_result());
        assert!(!DomainError::NoAgents.is_protocol_error());
        assert!(DomainError::UnknownAgent(AgentId::from("ghost")).is_protocol_error());
        assert!(DomainError::UnknownTask(TaskId::new(1)).is_protocol_error());
        assert!(DomainError::InvalidWeight(1.5).is_protocol_error());
    }
}
