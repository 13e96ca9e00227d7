//! Vote types for Quorum evaluation
//!
//! This module defines the voting primitives: a single weighted [`Vote`] and
//! the epoch-scoped [`VoteTally`] that keeps at most one vote per agent and
//! proposal.

use crate::agent::AgentId;
use crate::core::error::DomainError;
use crate::epoch::ProposalId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Default weight of a single agent's vote
pub const DEFAULT_VOTE_WEIGHT: f64 = 1.0;

/// A single vote from an agent for a proposal
///
/// # Example
///
/// ```
/// use liminal_domain::{AgentId, ProposalId, Vote};
///
/// let vote = Vote::new("agent-a", ProposalId::new(1));
/// assert_eq!(vote.weight, 1.0);
///
/// let partial = Vote::weighted("agent-b", ProposalId::new(1), 0.25).unwrap();
/// assert_eq!(partial.weight, 0.25);
///
/// assert!(Vote::weighted("agent-c", ProposalId::new(1), 1.5).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Voting agent
    pub agent: AgentId,
    /// Proposal being voted for
    pub proposal: ProposalId,
    /// Weight in [0, 1]
    pub weight: f64,
}

impl Vote {
    /// Create a full-weight vote
    pub fn new(agent: impl Into<AgentId>, proposal: ProposalId) -> Self {
        Self {
            agent: agent.into(),
            proposal,
            weight: DEFAULT_VOTE_WEIGHT,
        }
    }

    /// Create a vote with an explicit weight, rejecting weights outside [0, 1]
    pub fn weighted(
        agent: impl Into<AgentId>,
        proposal: ProposalId,
        weight: f64,
    ) -> Result<Self, DomainError> {
        validate_weight(weight)?;
        Ok(Self {
            agent: agent.into(),
            proposal,
            weight,
        })
    }
}

/// Check that a vote weight is finite and inside [0, 1]
pub fn validate_weight(weight: f64) -> Result<(), DomainError> {
    if weight.is_finite() && (0.0..=1.0).contains(&weight) {
        Ok(())
    } else {
        Err(DomainError::InvalidWeight(weight))
    }
}

/// Votes cast during one epoch
///
/// Re-casting a vote for the same proposal overwrites the previous weight,
/// so voting is idempotent.
#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    votes: HashMap<ProposalId, BTreeMap<AgentId, f64>>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a vote, returning the weight it replaced (if any)
    pub fn cast(&mut self, vote: Vote) -> Option<f64> {
        self.votes
            .entry(vote.proposal)
            .or_default()
            .insert(vote.agent, vote.weight)
    }

    /// Votes currently recorded for `proposal`, in agent order
    pub fn votes_for(&self, proposal: ProposalId) -> Vec<Vote> {
        self.votes
            .get(&proposal)
            .map(|by_agent| {
                by_agent
                    .iter()
                    .map(|(agent, weight)| Vote {
                        agent: agent.clone(),
                        proposal,
                        weight: *weight,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sum of recorded weights for `proposal`
    pub fn weight_for(&self, proposal: ProposalId) -> f64 {
        self.votes
            .get(&proposal)
            .map(|by_agent| by_agent.values().sum())
            .unwrap_or(0.0)
    }

    /// Number of agents that voted for `proposal`
    pub fn voter_count(&self, proposal: ProposalId) -> usize {
        self.votes.get(&proposal).map_or(0, BTreeMap::len)
    }

    /// Drop every vote for `proposal`
    pub fn retract(&mut self, proposal: ProposalId) {
        self.votes.remove(&proposal);
    }

    /// Drop every vote (epoch boundary)
    pub fn clear(&mut self) {
        self.votes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}
