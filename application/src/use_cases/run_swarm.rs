//! Run Swarm use case
//!
//! Drives a simulated swarm of agents against a running coordinator service
//! until the requested number of epochs has closed.
//!
//! Every simulated agent loops over the same steps: sync to the open epoch,
//! propose once per epoch, vote on its peers' pending proposals, then take
//! (or steal) a task, simulate the work and complete it.

use super::coordinator::EpochCoordinator;
use super::service::{AgentHandle, CoordinatorHandle, CoordinatorService};
use crate::ports::coordinator_port::{CoordinatorError, CoordinatorPort};
use crate::ports::journal::{EpochJournal, NoJournal};
use crate::ports::observer::{EpochObserver, NoObserver};
use crate::ports::planner::FanOutPlanner;
use liminal_domain::{
    AgentId, ConfigError, CoordinatorConfig, DomainError, Epoch, ProposalId, SchedulerTotals,
    TaskPoll,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long an idle agent polls for work before checking the epoch again
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Errors that can occur during a swarm run
#[derive(Error, Debug)]
pub enum RunSwarmError {
    #[error("A swarm needs at least one agent")]
    NoAgents,

    #[error("Approval rate must be within [0, 1], got {0}")]
    InvalidApprovalRate(f64),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("Coordinator service failed: {0}")]
    ServiceFailed(String),
}

/// Input for the RunSwarm use case
#[derive(Debug, Clone)]
pub struct RunSwarmInput {
    /// Number of simulated agents
    pub agents: usize,
    /// Stop once this many epochs have closed
    pub epochs: usize,
    /// Probability that an agent approves a peer's proposal
    pub approval_rate: f64,
    /// Tasks each committed proposal expands into
    pub tasks_per_proposal: usize,
    /// Simulated time spent on one task
    pub task_work: Duration,
    /// Wall-clock limit for the whole run
    pub time_budget: Duration,
    /// Seed for the agents' vote decisions
    pub seed: Option<u64>,
}

impl RunSwarmInput {
    pub fn new(agents: usize, epochs: usize) -> Self {
        Self {
            agents,
            epochs,
            approval_rate: 0.9,
            tasks_per_proposal: 3,
            task_work: Duration::from_millis(5),
            time_budget: Duration::from_secs(60),
            seed: None,
        }
    }

    pub fn with_approval_rate(mut self, rate: f64) -> Self {
        self.approval_rate = rate;
        self
    }

    pub fn with_tasks_per_proposal(mut self, tasks: usize) -> Self {
        self.tasks_per_proposal = tasks;
        self
    }

    pub fn with_task_work(mut self, work: Duration) -> Self {
        self.task_work = work;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<(), RunSwarmError> {
        if self.agents == 0 {
            return Err(RunSwarmError::NoAgents);
        }
        if !self.approval_rate.is_finite() || !(0.0..=1.0).contains(&self.approval_rate) {
            return Err(RunSwarmError::InvalidApprovalRate(self.approval_rate));
        }
        Ok(())
    }
}

/// Result of a swarm run
#[derive(Debug, Clone, Serialize)]
pub struct SwarmOutcome {
    pub agents: Vec<AgentId>,
    /// Closed epochs, oldest first
    pub epochs: Vec<Epoch>,
    /// The epoch still open when the run stopped
    pub open_epoch: Epoch,
    pub totals: SchedulerTotals,
    pub elapsed: Duration,
    /// False when the time budget ran out first
    pub reached_target: bool,
}

impl SwarmOutcome {
    pub fn committed(&self) -> usize {
        self.epochs.iter().map(|e| e.committed.len()).sum()
    }

    pub fn dropped(&self) -> usize {
        self.epochs.iter().map(|e| e.dropped.len()).sum()
    }
}

/// Use case for running a simulated swarm
pub struct RunSwarmUseCase {
    config: CoordinatorConfig,
    observer: Arc<dyn EpochObserver>,
    journal: Arc<dyn EpochJournal>,
}

impl RunSwarmUseCase {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NoObserver),
            journal: Arc::new(NoJournal),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn EpochObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_journal(mut self, journal: Arc<dyn EpochJournal>) -> Self {
        self.journal = journal;
        self
    }

    pub async fn execute(&self, input: RunSwarmInput) -> Result<SwarmOutcome, RunSwarmError> {
        input.validate()?;
        let started = Instant::now();

        let coordinator = EpochCoordinator::new(self.config.clone())?
            .with_observer(Arc::clone(&self.observer))
            .with_journal(Arc::clone(&self.journal))
            .with_planner(Arc::new(FanOutPlanner::new(input.tasks_per_proposal)));

        let service_token = CancellationToken::new();
        let (handle, service) = CoordinatorService::new(coordinator)
            .with_cancellation(service_token.clone())
            .spawn();

        info!(
            "Starting swarm: {} agents, {} epoch(s), threshold {}",
            input.agents, input.epochs, self.config.quorum_threshold
        );

        let agents_token = CancellationToken::new();
        let mut agents = Vec::with_capacity(input.agents);
        let mut join_set = JoinSet::new();
        for index in 0..input.agents {
            let agent = handle
                .register_agent(format!("agent-{:02}", index + 1))
                .await?;
            agents.push(agent.id().clone());

            let rng = match input.seed {
                Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(index as u64)),
                None => SmallRng::from_os_rng(),
            };
            let simulated = SimulatedAgent {
                handle: agent,
                rng,
                approval_rate: input.approval_rate,
                task_work: input.task_work,
                proposed_in: None,
                considered: HashSet::new(),
                round: 0,
            };
            join_set.spawn(simulated.run(agents_token.clone()));
        }

        let reached_target =
            wait_for_epochs(&handle, input.epochs, started + input.time_budget).await?;
        if !reached_target {
            warn!(
                "Time budget of {:?} ran out before {} epoch(s) closed",
                input.time_budget, input.epochs
            );
        }

        agents_token.cancel();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Simulated agent failed: {}", e),
                Err(e) => warn!("Agent task join error: {}", e),
            }
        }

        service_token.cancel();
        let coordinator = service
            .await
            .map_err(|e| RunSwarmError::ServiceFailed(e.to_string()))?;

        let outcome = SwarmOutcome {
            agents,
            epochs: coordinator.history().to_vec(),
            open_epoch: coordinator.current_epoch(),
            totals: coordinator.scheduler().totals(),
            elapsed: started.elapsed(),
            reached_target,
        };
        info!(
            "Swarm finished: {} epoch(s), {} committed, {} dropped, {} task(s) done in {:?}",
            outcome.epochs.len(),
            outcome.committed(),
            outcome.dropped(),
            outcome.totals.done,
            outcome.elapsed
        );
        Ok(outcome)
    }
}

/// Poll the coordinator until `epochs` epochs have closed or `deadline` passes
async fn wait_for_epochs(
    handle: &CoordinatorHandle,
    epochs: usize,
    deadline: Instant,
) -> Result<bool, CoordinatorError> {
    loop {
        if handle.closed_epochs().await?.len() >= epochs {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

struct SimulatedAgent {
    handle: AgentHandle,
    rng: SmallRng,
    approval_rate: f64,
    task_work: Duration,
    /// Epoch this agent last proposed in
    proposed_in: Option<u64>,
    /// Proposals already voted on (or declined)
    considered: HashSet<ProposalId>,
    round: u64,
}

impl SimulatedAgent {
    async fn run(mut self, token: CancellationToken) -> Result<(), CoordinatorError> {
        while !token.is_cancelled() {
            match self.step().await {
                Ok(()) => {}
                Err(CoordinatorError::ServiceStopped) => break,
                Err(e) => return Err(e),
            }
        }
        debug!("{} stopped after {} round(s)", self.handle.id(), self.round);
        Ok(())
    }

    async fn step(&mut self) -> Result<(), CoordinatorError> {
        self.round += 1;
        let epoch = self.handle.sync_epoch().await?.sequence;

        if self.proposed_in != Some(epoch) {
            let payload = format!("{} round {}", self.handle.id(), self.round);
            match self.handle.submit_proposal(payload).await {
                Ok(proposal) => {
                    self.proposed_in = Some(epoch);
                    self.considered.insert(proposal);
                    tolerate_race(self.handle.approve(proposal).await)?;
                }
                // The epoch closed under us; try again next round.
                Err(e) if e.is_epoch_closed() => return Ok(()),
                Err(e) => return Err(e),
            }
        }

        for proposal in self.handle.pending_proposals().await? {
            if !self.considered.insert(proposal.id) {
                continue;
            }
            if self.rng.random_bool(self.approval_rate) {
                tolerate_race(self.handle.approve(proposal.id).await)?;
            }
        }

        if let TaskPoll::Ready(task) = self.handle.next_task(IDLE_POLL).await? {
            tokio::time::sleep(self.task_work).await;
            self.handle.complete_task(task.id)?;
        }
        Ok(())
    }
}

/// A proposal can commit or be dropped between listing it and voting on it
fn tolerate_race(result: Result<(), CoordinatorError>) -> Result<(), CoordinatorError> {
    match result {
        Err(CoordinatorError::Domain(DomainError::UnknownProposal(_))) => Ok(()),
        other => other,
    }
}
