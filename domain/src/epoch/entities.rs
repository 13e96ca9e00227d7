//! Epoch entity

use super::proposal::{Proposal, ProposalId};
use crate::clock::VectorClock;
use crate::phase::{PhaseState, PhaseTransition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an epoch closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Stable and no task left queued or in flight
    BacklogDrained,
    /// Stable and the maximum epoch duration elapsed
    TimedOut,
}

impl CloseReason {
    pub fn as_str(&self) -> &str {
        match self {
            CloseReason::BacklogDrained => "backlog_drained",
            CloseReason::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::BacklogDrained => write!(f, "backlog drained"),
            CloseReason::TimedOut => write!(f, "timed out"),
        }
    }
}

/// A bounded round of proposal, vote and task activity
///
/// Owned by the coordinator while open. Once sealed it is never mutated
/// again; readers only ever see clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    /// Monotonic, starting at 1
    pub sequence: u64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Authoritative merged clock when the epoch opened
    pub opening_clock: VectorClock,
    /// Authoritative merged clock when the epoch closed
    pub closing_clock: Option<VectorClock>,
    /// Committed proposals in commit order
    pub committed: Vec<Proposal>,
    /// Proposals still unquorate at close
    pub dropped: Vec<ProposalId>,
    pub phase: PhaseState,
    pub transitions: Vec<PhaseTransition>,
    pub close_reason: Option<CloseReason>,
    /// Coordinator ticks run while this epoch was open
    pub ticks: u64,
}

impl Epoch {
    /// Open epoch `sequence` at the given merged clock
    pub fn open(sequence: u64, opening_clock: VectorClock) -> Self {
        Self {
            sequence,
            opened_at: Utc::now(),
            closed_at: None,
            opening_clock,
            closing_clock: None,
            committed: Vec::new(),
            dropped: Vec::new(),
            phase: PhaseState::Contested,
            transitions: Vec::new(),
            close_reason: None,
            ticks: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    /// Append a committed proposal; ignored once sealed
    pub fn record_commit(&mut self, proposal: Proposal) -> bool {
        if self.is_closed() {
            return false;
        }
        self.committed.push(proposal);
        true
    }

    /// Apply a phase transition; ignored once sealed or if it does not start
    /// from the current phase
    pub fn record_transition(&mut self, transition: PhaseTransition) -> bool {
        if self.is_closed() || transition.from != self.phase {
            return false;
        }
        self.phase = transition.to;
        self.transitions.push(transition);
        true
    }

    pub fn record_tick(&mut self) {
        if self.is_open() {
            self.ticks += 1;
        }
    }

    /// Seal the epoch: stamp the closing clock, dropped proposals and reason
    pub fn seal(
        &mut self,
        closing_clock: VectorClock,
        dropped: Vec<ProposalId>,
        reason: CloseReason,
    ) -> bool {
        if self.is_closed() {
            return false;
        }
        self.closing_clock = Some(closing_clock);
        self.dropped = dropped;
        self.close_reason = Some(reason);
        self.closed_at = Some(Utc::now());
        true
    }

    pub fn committed_ids(&self) -> Vec<ProposalId> {
        self.committed.iter().map(|p| p.id).collect()
    }

    /// Wall-clock time the epoch was (or has been) open
    pub fn duration(&self) -> chrono::Duration {
        self.closed_at.unwrap_or_else(Utc::now) - self.opened_at
    }
}
