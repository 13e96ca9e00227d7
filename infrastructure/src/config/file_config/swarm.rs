//! Swarm simulation settings from TOML (`[swarm]` section)

use liminal_application::RunSwarmInput;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw swarm configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSwarmConfig {
    /// Number of simulated agents
    pub agents: usize,
    /// Epochs to close before the run stops
    pub epochs: usize,
    /// Probability an agent approves a peer's proposal
    pub approval_rate: f64,
    pub tasks_per_proposal: usize,
    /// Simulated work per task
    pub task_work_ms: u64,
    /// Wall-clock budget for the whole run
    pub time_budget_ms: u64,
}

impl Default for FileSwarmConfig {
    fn default() -> Self {
        let defaults = RunSwarmInput::new(4, 3);
        Self {
            agents: defaults.agents,
            epochs: defaults.epochs,
            approval_rate: defaults.approval_rate,
            tasks_per_proposal: defaults.tasks_per_proposal,
            task_work_ms: defaults.task_work.as_millis() as u64,
            time_budget_ms: defaults.time_budget.as_millis() as u64,
        }
    }
}

impl FileSwarmConfig {
    pub fn to_input(&self) -> RunSwarmInput {
        RunSwarmInput::new(self.agents, self.epochs)
            .with_approval_rate(self.approval_rate)
            .with_tasks_per_proposal(self.tasks_per_proposal)
            .with_task_work(Duration::from_millis(self.task_work_ms))
            .with_time_budget(Duration::from_millis(self.time_budget_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swarm_defaults() {
        let input = FileSwarmConfig::default().to_input();
        assert_eq!(input.agents, 4);
        assert_eq!(input.epochs, 3);
        assert_eq!(input.seed, None);
    }

    #[test]
    fn test_deserialize_swarm_section() {
        let toml_str = r#"
[swarm]
agents = 8
approval_rate = 1.0
task_work_ms = 2
"#;
        let file: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let input = file.swarm.to_input();
        assert_eq!(input.agents, 8);
        assert_eq!(input.epochs, 3);
        assert_eq!(input.approval_rate, 1.0);
        assert_eq!(input.task_work, Duration::from_millis(2));
    }
}
