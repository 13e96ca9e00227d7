//! Quorum gate
//!
//! Decides whether the weighted fraction of agents backing a proposal
//! crosses the ignition threshold.

use super::vote::{Vote, validate_weight};
use crate::agent::AgentId;
use crate::config::ConfigError;
use crate::core::error::DomainError;
use crate::epoch::ProposalId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default ignition threshold
pub const DEFAULT_QUORUM_THRESHOLD: f64 = 0.62;

/// Rounding slack on the quorum comparison, in units of the compared
/// magnitude's last place
const ROUNDING_ULPS: f64 = 4.0;

/// Pure quorum predicate: `weight / total_agents >= threshold`
///
/// Closed interval: a ratio equal to the threshold is reached. The check is
/// done in weight space and only forgives float rounding error relative to
/// the size of the operands, so a summed weight that lands a few ulps short
/// of `threshold * total_agents` still counts while a genuinely smaller one
/// does not. Zero agents never reach quorum.
pub fn quorum_reached(weight: f64, total_agents: usize, threshold: f64) -> bool {
    if total_agents == 0 {
        return false;
    }
    let needed = threshold * total_agents as f64;
    let slack = needed.abs().max(weight.abs()) * f64::EPSILON * ROUNDING_ULPS;
    weight + slack >= needed
}

/// Outcome of evaluating one proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuorumDecision {
    pub proposal: ProposalId,
    /// Sum of de-duplicated vote weights
    pub weight: f64,
    /// Registered agents at evaluation time
    pub total_agents: usize,
    pub threshold: f64,
    pub reached: bool,
}

impl QuorumDecision {
    /// Weighted agreement ratio (0.0 when there are no agents)
    pub fn ratio(&self) -> f64 {
        if self.total_agents == 0 {
            0.0
        } else {
            self.weight / self.total_agents as f64
        }
    }
}

/// Weighted quorum evaluator with a validated threshold
///
/// # Example
///
/// ```
/// use liminal_domain::{AgentId, ProposalId, QuorumGate, Vote};
/// use std::collections::BTreeSet;
///
/// let agents: BTreeSet<AgentId> = ["a", "b", "c", "d", "e"].into_iter().map(AgentId::from).collect();
/// let gate = QuorumGate::default(); // 0.62
/// let p = ProposalId::new(1);
///
/// let three: Vec<Vote> = ["a", "b", "c"].into_iter().map(|a| Vote::new(a, p)).collect();
/// assert!(!gate.evaluate(p, &three, &agents).unwrap().reached); // 3/5 = 0.6
///
/// let mut four = three.clone();
/// four.push(Vote::new("d", p));
/// assert!(gate.evaluate(p, &four, &agents).unwrap().reached); // 4/5 = 0.8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuorumGate {
    threshold: f64,
}

impl Default for QuorumGate {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_QUORUM_THRESHOLD,
        }
    }
}

impl QuorumGate {
    /// Create a gate, rejecting thresholds outside [0, 1]
    pub fn new(threshold: f64) -> Result<Self, ConfigError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::OutOfRange {
                field: "quorum_threshold",
                value: threshold,
            });
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Evaluate `proposal` against `votes`
    ///
    /// Votes for other proposals are ignored. A vote from an agent outside
    /// `agents` fails the whole evaluation with `UnknownAgent`. When the same
    /// agent appears twice, the later vote wins.
    pub fn evaluate(
        &self,
        proposal: ProposalId,
        votes: &[Vote],
        agents: &BTreeSet<AgentId>,
    ) -> Result<QuorumDecision, DomainError> {
        let mut by_agent: BTreeMap<&AgentId, f64> = BTreeMap::new();

        for vote in votes.iter().filter(|v| v.proposal == proposal) {
            if !agents.contains(&vote.agent) {
                return Err(DomainError::UnknownAgent(vote.agent.clone()));
            }
            validate_weight(vote.weight)?;
            by_agent.insert(&vote.agent, vote.weight);
        }

        let weight: f64 = by_agent.values().sum();
        let total_agents = agents.len();

        Ok(QuorumDecision {
            proposal,
            weight,
            total_agents,
            threshold: self.threshold,
            reached: quorum_reached(weight, total_agents, self.threshold),
        })
    }

    /// Minimum summed weight needed given `total_agents`
    pub fn min_weight_needed(&self, total_agents: usize) -> f64 {
        self.threshold * total_agents as f64
    }
}

impl std::fmt::Display for QuorumGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "at least {:.0}% weighted agreement", self.threshold * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_agents() -> BTreeSet<AgentId> {
        ["a", "b", "c", "d", "e"]
            .into_iter()
            .map(AgentId::from)
            .collect()
    }

    fn p() -> ProposalId {
        ProposalId::new(7)
    }

    #[test]
    fn test_threshold_boundary_with_five_agents() {
        assert!(!quorum_reached(3.0, 5, 0.62));
        assert!(quorum_reached(3.1, 5, 0.62));
        assert!(quorum_reached(0.62 * 5.0, 5, 0.62));
    }

    // ==================== Rounding at the boundary ====================

    #[test]
    fn test_just_below_threshold_is_not_reached() {
        assert!(!quorum_reached(3.0999999951, 5, 0.62));
        assert!(!quorum_reached(0.62 * 5.0 - 1e-12, 5, 0.62));
        assert!(!quorum_reached(619_999.0, 1_000_000, 0.62));
    }

    #[test]
    fn test_rounded_sums_on_the_boundary_are_reached() {
        assert!(quorum_reached(3.0 + 0.1, 5, 0.62));
        assert!(quorum_reached(620_000.0, 1_000_000, 0.62));

        // The summed weights land one ulp under 0.66 * 5.0.
        let weight: f64 = [0.6, 0.6, 0.7, 0.7, 0.7].iter().sum();
        assert!(weight < 0.66 * 5.0);
        assert!(quorum_reached(weight, 5, 0.66));
    }

    #[test]
    fn test_zero_threshold_is_reached_without_votes() {
        assert!(quorum_reached(0.0, 3, 0.0));
    }

    // ==================== Gate ====================

    #[test]
    fn test_weighted_votes_reach_at_exact_boundary() {
        let gate = QuorumGate::default();
        let mut votes: Vec<Vote> = ["a", "b", "c"].into_iter().map(|a| Vote::new(a, p())).collect();

        let below = gate.evaluate(p(), &votes, &five_agents()).unwrap();
        assert!(!below.reached);
        assert!((below.ratio() - 0.6).abs() < 1e-12);

        votes.push(Vote::weighted("d", p(), 0.1).unwrap());
        let at = gate.evaluate(p(), &votes, &five_agents()).unwrap();
        assert!(at.reached);
    }

    #[test]
    fn test_duplicate_votes_do_not_double_count() {
        let gate = QuorumGate::default();
        let votes = vec![
            Vote::new("a", p()),
            Vote::new("a", p()),
            Vote::new("a", p()),
            Vote::new("b", p()),
        ];
        let decision = gate.evaluate(p(), &votes, &five_agents()).unwrap();
        assert_eq!(decision.weight, 2.0);
        assert!(!decision.reached);
    }

    #[test]
    fn test_later_duplicate_overwrites() {
        let gate = QuorumGate::new(0.2).unwrap();
        let votes = vec![
            Vote::new("a", p()),
            Vote::weighted("a", p(), 0.0).unwrap(),
        ];
        let decision = gate.evaluate(p(), &votes, &five_agents()).unwrap();
        assert_eq!(decision.weight, 0.0);
        assert!(!decision.reached);
    }

    #[test]
    fn test_unknown_agent_is_rejected() {
        let gate = QuorumGate::default();
        let votes = vec![Vote::new("a", p()), Vote::new("mallory", p())];
        assert_eq!(
            gate.evaluate(p(), &votes, &five_agents()).unwrap_err(),
            DomainError::UnknownAgent(AgentId::from("mallory"))
        );
    }

    #[test]
    fn test_votes_for_other_proposals_are_ignored() {
        let gate = QuorumGate::default();
        let other = ProposalId::new(99);
        let votes: Vec<Vote> = ["a", "b", "c", "d"].into_iter().map(|a| Vote::new(a, other)).collect();
        let decision = gate.evaluate(p(), &votes, &five_agents()).unwrap();
        assert_eq!(decision.weight, 0.0);
    }

    #[test]
    fn test_zero_agents_never_reach() {
        let gate = QuorumGate::new(0.0).unwrap();
        let decision = gate.evaluate(p(), &[], &BTreeSet::new()).unwrap();
        assert!(!decision.reached);
        assert_eq!(decision.ratio(), 0.0);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        assert!(QuorumGate::new(1.01).is_err());
        assert!(QuorumGate::new(-0.5).is_err());
        assert!(QuorumGate::new(f64::NAN).is_err());
        assert!(QuorumGate::new(1.0).is_ok());
    }

    #[test]
    fn test_min_weight_needed() {
        let gate = QuorumGate::default();
        assert!((gate.min_weight_needed(5) - 3.1).abs() < 1e-12);
        assert_eq!(gate.to_string(), "at least 62% weighted agreement");
    }
}
