//! Proposal value objects

use crate::agent::AgentId;
use crate::clock::VectorClock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(u64);

impl ProposalId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p-{}", self.0)
    }
}

/// What an agent hands to the coordinator
///
/// `epoch` is the epoch the author believes is open. A draft aimed at an
/// epoch that has already closed is rejected, never carried over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub author: AgentId,
    pub payload: Vec<u8>,
    pub clock: VectorClock,
    pub epoch: u64,
}

impl ProposalDraft {
    pub fn new(
        author: impl Into<AgentId>,
        payload: impl Into<Vec<u8>>,
        clock: VectorClock,
        epoch: u64,
    ) -> Self {
        Self {
            author: author.into(),
            payload: payload.into(),
            clock,
            epoch,
        }
    }
}

/// A submitted proposal (immutable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub author: AgentId,
    pub payload: Vec<u8>,
    /// Author's clock at submission
    pub clock: VectorClock,
    pub submitted_epoch: u64,
    /// Coordinator-local submission counter, strictly increasing
    pub submitted_seq: u64,
    pub submitted_at: DateTime<Utc>,
}

impl Proposal {
    /// Payload as text, replacing invalid UTF-8
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
