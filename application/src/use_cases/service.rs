//! Coordinator service
//!
//! Runs an [`EpochCoordinator`] inside a single tokio task. Agent traffic
//! arrives as commands on an mpsc channel and is answered over oneshot
//! channels, so the coordinator stays single-writer without locks. The task
//! ticks the coordinator on an interval and stops when cancelled or when every
//! handle has been dropped; it hands the coordinator back on exit.
//!
//! Task traffic does not go through the actor: [`AgentHandle`] talks to the
//! shared [`WorkStealingScheduler`] directly.

use super::coordinator::{EpochCoordinator, TickReport};
use crate::ports::coordinator_port::{CoordinatorError, CoordinatorPort, SubmitReceipt};
use async_trait::async_trait;
use liminal_domain::{
    AgentId, DEFAULT_VOTE_WEIGHT, DomainError, Epoch, Proposal, ProposalDraft, ProposalId,
    TaskId, TaskPoll, VectorClock, Vote, WorkStealingScheduler,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

const COMMAND_BUFFER: usize = 256;

/// First and largest sleep between task polls in [`AgentHandle::next_task`]
const MIN_BACKOFF: Duration = Duration::from_millis(1);
const MAX_BACKOFF: Duration = Duration::from_millis(50);

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Register {
        agent: AgentId,
        reply: Reply<Result<(), DomainError>>,
    },
    Submit {
        draft: ProposalDraft,
        reply: Reply<Result<SubmitReceipt, DomainError>>,
    },
    Vote {
        vote: Vote,
        reply: Reply<Result<(), DomainError>>,
    },
    Withdraw {
        agent: AgentId,
        proposal: ProposalId,
        reply: Reply<Result<(), DomainError>>,
    },
    Tick {
        reply: Reply<Result<TickReport, DomainError>>,
    },
    CurrentEpoch {
        reply: Reply<Epoch>,
    },
    ClosedEpochs {
        reply: Reply<Vec<Epoch>>,
    },
    Pending {
        reply: Reply<Vec<Proposal>>,
    },
}

/// Actor wrapper around [`EpochCoordinator`]
pub struct CoordinatorService {
    coordinator: EpochCoordinator,
    cancellation_token: CancellationToken,
    auto_tick: bool,
}

impl CoordinatorService {
    pub fn new(coordinator: EpochCoordinator) -> Self {
        Self {
            coordinator,
            cancellation_token: CancellationToken::new(),
            auto_tick: true,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Only tick when asked through [`CoordinatorHandle::tick`]
    pub fn manual_ticks(mut self) -> Self {
        self.auto_tick = false;
        self
    }

    /// Start the actor on the current tokio runtime
    pub fn spawn(self) -> (CoordinatorHandle, JoinHandle<EpochCoordinator>) {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let handle = CoordinatorHandle {
            commands,
            scheduler: self.coordinator.scheduler(),
        };
        let join = tokio::spawn(self.run(receiver));
        (handle, join)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> EpochCoordinator {
        let period = self.coordinator.config().tick_interval;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let token = self.cancellation_token.clone();

        info!(
            "Coordinator service started (tick every {:?}, auto tick: {})",
            period, self.auto_tick
        );

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Coordinator service cancelled");
                    break;
                }
                _ = interval.tick(), if self.auto_tick => self.tick(),
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        debug!("All coordinator handles dropped");
                        break;
                    }
                },
            }
        }

        info!(
            "Coordinator service stopped after {} closed epoch(s)",
            self.coordinator.history().len()
        );
        self.coordinator
    }

    fn tick(&mut self) {
        match self.coordinator.tick() {
            Ok(report) => {
                if let Some(closed) = &report.closed {
                    debug!("Tick closed epoch {}", closed.sequence);
                }
            }
            Err(DomainError::NoAgents) => trace!("Tick skipped: no agents registered"),
            Err(e) => warn!("Tick failed: {}", e),
        }
    }

    // A send error means the caller stopped waiting; there is nobody to tell.
    fn handle(&mut self, command: Command) {
        match command {
            Command::Register { agent, reply } => {
                let _ = reply.send(self.coordinator.register_agent(agent));
            }
            Command::Submit { draft, reply } => {
                let _ = reply.send(self.coordinator.submit_proposal(draft));
            }
            Command::Vote { vote, reply } => {
                let result = self
                    .coordinator
                    .cast_vote(&vote.agent, vote.proposal, vote.weight);
                let _ = reply.send(result);
            }
            Command::Withdraw {
                agent,
                proposal,
                reply,
            } => {
                let _ = reply.send(self.coordinator.withdraw_proposal(&agent, proposal));
            }
            Command::Tick { reply } => {
                let _ = reply.send(self.coordinator.tick());
            }
            Command::CurrentEpoch { reply } => {
                let _ = reply.send(self.coordinator.current_epoch());
            }
            Command::ClosedEpochs { reply } => {
                let _ = reply.send(self.coordinator.history().to_vec());
            }
            Command::Pending { reply } => {
                let _ = reply.send(self.coordinator.pending_proposals());
            }
        }
    }
}

/// Cloneable sender side of a running [`CoordinatorService`]
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    scheduler: Arc<WorkStealingScheduler>,
}

impl CoordinatorHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, CoordinatorError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| CoordinatorError::ServiceStopped)?;
        response.await.map_err(|_| CoordinatorError::ServiceStopped)
    }

    /// Register `agent` and hand back its handle, synced to the open epoch
    pub async fn register_agent(
        &self,
        agent: impl Into<AgentId>,
    ) -> Result<AgentHandle, CoordinatorError> {
        let agent = agent.into();
        self.register(agent.clone()).await?;
        let epoch = self.current_epoch().await?;
        Ok(AgentHandle::new(
            agent,
            Arc::new(self.clone()),
            Arc::clone(&self.scheduler),
            epoch.sequence,
        ))
    }

    /// Run one tick now, regardless of the interval
    pub async fn tick(&self) -> Result<TickReport, CoordinatorError> {
        Ok(self.request(|reply| Command::Tick { reply }).await??)
    }

    pub fn scheduler(&self) -> Arc<WorkStealingScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// The service task has exited
    pub fn is_stopped(&self) -> bool {
        self.commands.is_closed()
    }
}

#[async_trait]
impl CoordinatorPort for CoordinatorHandle {
    async fn register(&self, agent: AgentId) -> Result<(), CoordinatorError> {
        Ok(self
            .request(|reply| Command::Register { agent, reply })
            .await??)
    }

    async fn submit(&self, draft: ProposalDraft) -> Result<SubmitReceipt, CoordinatorError> {
        Ok(self
            .request(|reply| Command::Submit { draft, reply })
            .await??)
    }

    async fn vote(&self, vote: Vote) -> Result<(), CoordinatorError> {
        Ok(self.request(|reply| Command::Vote { vote, reply }).await??)
    }

    async fn withdraw(
        &self,
        agent: AgentId,
        proposal: ProposalId,
    ) -> Result<(), CoordinatorError> {
        Ok(self
            .request(|reply| Command::Withdraw {
                agent,
                proposal,
                reply,
            })
            .await??)
    }

    async fn current_epoch(&self) -> Result<Epoch, CoordinatorError> {
        self.request(|reply| Command::CurrentEpoch { reply }).await
    }

    async fn closed_epochs(&self) -> Result<Vec<Epoch>, CoordinatorError> {
        self.request(|reply| Command::ClosedEpochs { reply }).await
    }

    async fn pending_proposals(&self) -> Result<Vec<Proposal>, CoordinatorError> {
        self.request(|reply| Command::Pending { reply }).await
    }
}

/// One agent's view of the coordinator
///
/// Keeps the agent's local vector clock and the epoch it believes is open.
/// Proposal and vote traffic goes through the [`CoordinatorPort`]; tasks are
/// taken from the shared scheduler directly.
pub struct AgentHandle {
    id: AgentId,
    coordinator: Arc<dyn CoordinatorPort>,
    scheduler: Arc<WorkStealingScheduler>,
    clock: VectorClock,
    epoch: u64,
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.id)
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl AgentHandle {
    pub fn new(
        id: AgentId,
        coordinator: Arc<dyn CoordinatorPort>,
        scheduler: Arc<WorkStealingScheduler>,
        epoch: u64,
    ) -> Self {
        Self {
            id,
            coordinator,
            scheduler,
            clock: VectorClock::new(),
            epoch,
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Local clock, including everything learned from the coordinator
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    /// Epoch this agent will submit into
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    // ==================== Proposals ====================

    /// Submit a proposal into the epoch this agent believes is open
    ///
    /// On `EpochClosed` the handle adopts the coordinator's current epoch so
    /// the caller can resubmit.
    pub async fn submit_proposal(
        &mut self,
        payload: impl Into<Vec<u8>>,
    ) -> Result<ProposalId, CoordinatorError> {
        self.clock = self.clock.increment(&self.id);
        let draft = ProposalDraft::new(self.id.clone(), payload, self.clock.clone(), self.epoch);

        match self.coordinator.submit(draft).await {
            Ok(receipt) => {
                self.clock = self.clock.merge(&receipt.clock);
                self.epoch = receipt.epoch;
                Ok(receipt.id)
            }
            Err(e) => {
                if let CoordinatorError::Domain(DomainError::EpochClosed { current, .. }) = &e {
                    debug!("{} moves on to epoch {}", self.id, current);
                    self.epoch = *current;
                }
                Err(e)
            }
        }
    }

    /// Fetch the open epoch, adopting its sequence and opening clock
    pub async fn sync_epoch(&mut self) -> Result<Epoch, CoordinatorError> {
        let epoch = self.coordinator.current_epoch().await?;
        self.epoch = epoch.sequence;
        self.clock = self.clock.merge(&epoch.opening_clock);
        Ok(epoch)
    }

    pub async fn cast_vote(&self, proposal: ProposalId, weight: f64) -> Result<(), CoordinatorError> {
        let vote = Vote::weighted(self.id.clone(), proposal, weight)?;
        self.coordinator.vote(vote).await
    }

    /// Full-weight vote
    pub async fn approve(&self, proposal: ProposalId) -> Result<(), CoordinatorError> {
        self.cast_vote(proposal, DEFAULT_VOTE_WEIGHT).await
    }

    pub async fn withdraw_proposal(&self, proposal: ProposalId) -> Result<(), CoordinatorError> {
        self.coordinator.withdraw(self.id.clone(), proposal).await
    }

    pub async fn pending_proposals(&self) -> Result<Vec<Proposal>, CoordinatorError> {
        self.coordinator.pending_proposals().await
    }

    // ==================== Tasks ====================

    /// Own work first, then steal; never blocks
    pub fn pop_task(&self) -> Result<TaskPoll, CoordinatorError> {
        Ok(self.scheduler.pop_task(&self.id)?)
    }

    /// Poll for work with exponential backoff until `timeout` elapses
    pub async fn next_task(&self, timeout: Duration) -> Result<TaskPoll, CoordinatorError> {
        let deadline = Instant::now() + timeout;
        let mut backoff = MIN_BACKOFF;

        loop {
            if let ready @ TaskPoll::Ready(_) = self.pop_task()? {
                return Ok(ready);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(TaskPoll::NoWorkAvailable);
            }
            tokio::time::sleep(backoff.min(deadline - now)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    /// Queue a follow-up task on this agent's own deque
    pub fn spawn_task(&self, payload: impl Into<Vec<u8>>) -> Result<TaskId, CoordinatorError> {
        let task = self.scheduler.create_task(&self.id, payload);
        Ok(self.scheduler.push_local(&self.id, task)?)
    }

    pub fn complete_task(&self, task: TaskId) -> Result<(), CoordinatorError> {
        self.scheduler.complete(&self.id, task)?;
        Ok(())
    }

    /// Give up on a queued or in-flight task; it ends up `Cancelled`
    pub fn abandon_task(&self, task: TaskId) -> Result<(), CoordinatorError> {
        self.scheduler.cancel(&self.id, task)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liminal_domain::{CoordinatorConfig, TaskState};

    fn manual_service() -> (CoordinatorHandle, JoinHandle<EpochCoordinator>, CancellationToken) {
        let token = CancellationToken::new();
        let coordinator = EpochCoordinator::new(CoordinatorConfig::default().with_seed(3)).unwrap();
        let (handle, join) = CoordinatorService::new(coordinator)
            .manual_ticks()
            .with_cancellation(token.clone())
            .spawn();
        (handle, join, token)
    }

    #[tokio::test]
    async fn test_round_trip_through_service() {
        let (handle, join, token) = manual_service();
        let mut a = handle.register_agent("a").await.unwrap();
        let b = handle.register_agent("b").await.unwrap();
        let c = handle.register_agent("c").await.unwrap();

        let p = a.submit_proposal("build index").await.unwrap();
        assert_eq!(a.pending_proposals().await.unwrap()[0].id, p);
        for agent in [&a, &b, &c] {
            agent.approve(p).await.unwrap();
        }

        let report = handle.tick().await.unwrap();
        assert_eq!(report.committed, vec![p]);

        let task = a
            .next_task(Duration::from_millis(50))
            .await
            .unwrap()
            .into_task()
            .unwrap();
        assert_eq!(task.origin, Some(p));
        a.complete_task(task.id).unwrap();

        token.cancel();
        let coordinator = join.await.unwrap();
        assert_eq!(coordinator.current_epoch().committed_ids(), vec![p]);
        assert_eq!(coordinator.scheduler().totals().done, 1);
    }

    #[tokio::test]
    async fn test_agent_clock_learns_from_coordinator() {
        let (handle, _join, _token) = manual_service();
        let mut a = handle.register_agent("A").await.unwrap();
        let mut b = handle.register_agent("B").await.unwrap();

        a.submit_proposal("first").await.unwrap();
        assert_eq!(a.clock(), &VectorClock::from_entries([("A", 1)]));

        b.submit_proposal("second").await.unwrap();
        assert_eq!(b.clock(), &VectorClock::from_entries([("A", 1), ("B", 1)]));
        assert!(a.clock().happened_before(b.clock()));
    }

    #[tokio::test]
    async fn test_stale_agent_adopts_current_epoch() {
        let (handle, _join, _token) = manual_service();
        handle.register_agent("a").await.unwrap();

        let mut stale = AgentHandle::new(
            AgentId::from("a"),
            Arc::new(handle.clone()),
            handle.scheduler(),
            7,
        );
        let err = stale.submit_proposal("late").await.unwrap_err();
        assert_eq!(
            err,
            CoordinatorError::Domain(DomainError::EpochClosed {
                submitted: 7,
                current: 1
            })
        );
        assert_eq!(stale.epoch(), 1);
        assert!(stale.submit_proposal("retry").await.is_ok());
    }

    #[tokio::test]
    async fn test_protocol_errors_pass_through() {
        let (handle, _join, _token) = manual_service();
        let a = handle.register_agent("a").await.unwrap();

        assert_eq!(
            a.approve(ProposalId::new(42)).await.unwrap_err(),
            CoordinatorError::Domain(DomainError::UnknownProposal(ProposalId::new(42)))
        );
        assert!(matches!(
            a.cast_vote(ProposalId::new(1), -0.5).await,
            Err(CoordinatorError::Domain(DomainError::InvalidWeight(_)))
        ));
        assert!(matches!(
            handle.register_agent("a").await,
            Err(CoordinatorError::Domain(DomainError::AgentAlreadyRegistered(_)))
        ));
        assert!(matches!(
            a.complete_task(TaskId::new(9)),
            Err(CoordinatorError::Domain(DomainError::UnknownTask(_)))
        ));
    }

    #[tokio::test]
    async fn test_next_task_gives_up_at_deadline() {
        let (handle, _join, _token) = manual_service();
        let a = handle.register_agent("a").await.unwrap();
        handle.register_agent("b").await.unwrap();

        let started = Instant::now();
        let poll = a.next_task(Duration::from_millis(20)).await.unwrap();
        assert_eq!(poll, TaskPoll::NoWorkAvailable);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_spawn_and_abandon_task() {
        let (handle, _join, _token) = manual_service();
        let a = handle.register_agent("a").await.unwrap();
        let b = handle.register_agent("b").await.unwrap();

        let queued = a.spawn_task("follow-up").unwrap();
        let stolen = b.pop_task().unwrap().into_task().unwrap();
        assert_eq!(stolen.id, queued);
        assert_eq!(stolen.state, TaskState::Stolen);

        b.abandon_task(stolen.id).unwrap();
        let totals = handle.scheduler().totals();
        assert_eq!(totals.cancelled, 1);
        assert!(totals.is_conserved());
    }

    #[tokio::test]
    async fn test_calls_fail_once_stopped() {
        let (handle, join, token) = manual_service();
        token.cancel();
        join.await.unwrap();

        assert!(handle.is_stopped());
        assert_eq!(
            handle.current_epoch().await.unwrap_err(),
            CoordinatorError::ServiceStopped
        );
        assert!(handle.register_agent("a").await.unwrap_err().is_stopped());
    }

    #[tokio::test]
    async fn test_auto_tick_closes_epoch() {
        let coordinator = EpochCoordinator::new(
            CoordinatorConfig::default().with_tick_interval(Duration::from_millis(2)),
        )
        .unwrap();
        let (handle, _join) = CoordinatorService::new(coordinator).spawn();

        let mut a = handle.register_agent("a").await.unwrap();
        let b = handle.register_agent("b").await.unwrap();
        let p = a.submit_proposal("settle").await.unwrap();
        a.approve(p).await.unwrap();
        b.approve(p).await.unwrap();

        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let TaskPoll::Ready(task) = a.pop_task().unwrap() {
                    a.complete_task(task.id).unwrap();
                }
                let closed = handle.closed_epochs().await.unwrap();
                if !closed.is_empty() {
                    return closed;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("epoch should close");

        assert_eq!(closed[0].committed_ids(), vec![p]);
        assert_eq!(handle.current_epoch().await.unwrap().sequence, 2);
    }
}
