//! Quorum domain
//!
//! Weighted voting over proposals. Agents cast at most one vote per proposal
//! per epoch (re-casting overwrites); a proposal commits once the weighted
//! fraction of registered agents backing it reaches the ignition threshold.
//!
//! ```text
//! votes ──▶ VoteTally (epoch-scoped, one vote per agent)
//!                │
//!                ▼
//!          QuorumGate::evaluate ──▶ QuorumDecision { reached, ratio, .. }
//! ```

pub mod gate;
pub mod vote;

pub use gate::{DEFAULT_QUORUM_THRESHOLD, QuorumDecision, QuorumGate, quorum_reached};
pub use vote::{DEFAULT_VOTE_WEIGHT, Vote, VoteTally, validate_weight};
