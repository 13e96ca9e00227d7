//! Coordinator port
//!
//! The host-facing API agents talk to. [`CoordinatorHandle`] implements it
//! over the coordinator service's command channel; tests and embedders can
//! put their own implementation behind an [`AgentHandle`].
//!
//! [`CoordinatorHandle`]: crate::use_cases::service::CoordinatorHandle
//! [`AgentHandle`]: crate::use_cases::service::AgentHandle

use async_trait::async_trait;
use liminal_domain::{
    AgentId, ConfigError, DomainError, Epoch, Proposal, ProposalDraft, ProposalId, VectorClock,
    Vote,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the coordinator's host API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Coordinator service has stopped")]
    ServiceStopped,
}

impl CoordinatorError {
    /// The draft targeted an epoch that is no longer open
    pub fn is_epoch_closed(&self) -> bool {
        matches!(self, CoordinatorError::Domain(DomainError::EpochClosed { .. }))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, CoordinatorError::ServiceStopped)
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            CoordinatorError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// What the coordinator hands back for an accepted proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub id: ProposalId,
    /// Epoch the proposal was accepted into
    pub epoch: u64,
    /// Authoritative merged clock after accepting the proposal
    pub clock: VectorClock,
}

/// Host API of the epoch coordinator
#[async_trait]
pub trait CoordinatorPort: Send + Sync {
    /// Register an agent and create its deque
    async fn register(&self, agent: AgentId) -> Result<(), CoordinatorError>;

    /// Submit a proposal into the epoch named by the draft
    async fn submit(&self, draft: ProposalDraft) -> Result<SubmitReceipt, CoordinatorError>;

    /// Cast (or overwrite) a vote on a pending proposal
    async fn vote(&self, vote: Vote) -> Result<(), CoordinatorError>;

    /// Withdraw one of the agent's own pending proposals
    async fn withdraw(&self, agent: AgentId, proposal: ProposalId)
    -> Result<(), CoordinatorError>;

    /// Snapshot of the open epoch
    async fn current_epoch(&self) -> Result<Epoch, CoordinatorError>;

    /// Snapshots of every closed epoch, oldest first
    async fn closed_epochs(&self) -> Result<Vec<Epoch>, CoordinatorError>;

    /// Pending proposals of the open epoch in causal order
    async fn pending_proposals(&self) -> Result<Vec<Proposal>, CoordinatorError>;
}
