//! Proposal planner port
//!
//! Turns a committed proposal into the tasks that carry it out.

use liminal_domain::{AgentId, Proposal};

/// A task the coordinator should push onto a deque
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    /// Agent whose deque receives the task
    pub owner: AgentId,
    pub payload: Vec<u8>,
}

impl PlannedTask {
    pub fn new(owner: AgentId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            owner,
            payload: payload.into(),
        }
    }
}

/// Expands committed proposals into tasks
///
/// Called by the coordinator once per committed proposal, in commit order.
/// Returning no tasks is valid (a proposal that only records a decision).
pub trait ProposalPlanner: Send + Sync {
    fn plan(&self, proposal: &Proposal) -> Vec<PlannedTask>;
}

/// One task on the author's deque carrying the proposal payload
pub struct SingleTaskPlanner;

impl ProposalPlanner for SingleTaskPlanner {
    fn plan(&self, proposal: &Proposal) -> Vec<PlannedTask> {
        vec![PlannedTask::new(
            proposal.author.clone(),
            proposal.payload.clone(),
        )]
    }
}

/// `tasks` tasks on the author's deque, leaving the rest of the swarm to
/// steal them
pub struct FanOutPlanner {
    tasks: usize,
}

impl FanOutPlanner {
    pub fn new(tasks: usize) -> Self {
        Self { tasks }
    }
}

impl ProposalPlanner for FanOutPlanner {
    fn plan(&self, proposal: &Proposal) -> Vec<PlannedTask> {
        (0..self.tasks)
            .map(|part| {
                let mut payload = proposal.payload.clone();
                payload.extend_from_slice(format!("#{part}").as_bytes());
                PlannedTask::new(proposal.author.clone(), payload)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use liminal_domain::{ProposalId, VectorClock};

    fn proposal() -> Proposal {
        Proposal {
            id: ProposalId::new(1),
            author: AgentId::from("a"),
            payload: b"index".to_vec(),
            clock: VectorClock::new(),
            submitted_epoch: 1,
            submitted_seq: 1,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_single_task_planner() {
        let tasks = SingleTaskPlanner.plan(&proposal());
        assert_eq!(tasks, vec![PlannedTask::new(AgentId::from("a"), "index")]);
    }

    #[test]
    fn test_fan_out_planner() {
        let tasks = FanOutPlanner::new(3).plan(&proposal());
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[2].payload, b"index#2".to_vec());
        assert!(tasks.iter().all(|t| t.owner == AgentId::from("a")));

        assert!(FanOutPlanner::new(0).plan(&proposal()).is_empty());
    }
}
