//! Epoch coordinator
//!
//! Single-writer core of the system. It exclusively owns the open epoch, the
//! pending proposals, the vote tally and the authoritative merged clock; all
//! mutation goes through `&mut self`. The work-stealing scheduler is shared
//! (agents pop and steal directly), and the coordinator drains its report on
//! every tick.
//!
//! ```text
//! submit ─▶ merge clock ─▶ pending (causal order)
//! vote   ─▶ tally ──────────────┐
//! tick   ─▶ QuorumGate ─▶ commit ─▶ planner ─▶ scheduler
//!        ─▶ drain report ─▶ PhaseDetector ─▶ Stable? ─▶ seal + open next
//! ```

use crate::ports::coordinator_port::SubmitReceipt;
use crate::ports::journal::{EpochJournal, JournalEvent, NoJournal};
use crate::ports::observer::{EpochObserver, NoObserver};
use crate::ports::planner::{ProposalPlanner, SingleTaskPlanner};
use chrono::Utc;
use liminal_domain::{
    AgentId, CloseReason, ConfigError, CoordinatorConfig, DomainError, Epoch, PhaseDetector,
    PhaseState, PhaseTransition, Proposal, ProposalDraft, ProposalId, QuorumGate, TickSample,
    VectorClock, Vote, VoteTally, WorkStealingScheduler, insert_causal,
};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// What happened during one coordinator tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// Epoch the tick ran in
    pub epoch: u64,
    /// Proposals committed this tick, in commit order
    pub committed: Vec<ProposalId>,
    /// Sample fed to the phase detector
    pub sample: TickSample,
    pub steals: u64,
    pub idle_polls: u64,
    pub cancelled: usize,
    pub transition: Option<PhaseTransition>,
    /// Phase of the tick's epoch after the sample
    pub phase: PhaseState,
    /// Tasks queued or in flight after the tick
    pub backlog: usize,
    /// The sealed epoch, when this tick closed it
    pub closed: Option<Epoch>,
}

impl TickReport {
    pub fn closed_epoch(&self) -> bool {
        self.closed.is_some()
    }
}

/// Orchestrates proposals, votes, tasks and phase detection into epochs
pub struct EpochCoordinator {
    config: CoordinatorConfig,
    gate: QuorumGate,
    detector: PhaseDetector,
    scheduler: Arc<WorkStealingScheduler>,
    planner: Arc<dyn ProposalPlanner>,
    observer: Arc<dyn EpochObserver>,
    journal: Arc<dyn EpochJournal>,
    agents: BTreeSet<AgentId>,
    clock: VectorClock,
    current: Epoch,
    opened: Instant,
    announced: bool,
    history: Vec<Epoch>,
    pending: BTreeMap<ProposalId, Proposal>,
    /// Pending proposal ids in causal order
    order: Vec<ProposalId>,
    tally: VoteTally,
    next_seq: u64,
    submitted_since_tick: u64,
}

impl EpochCoordinator {
    /// Validate `config` and open epoch 1
    pub fn new(config: CoordinatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let gate = config.gate()?;
        let scheduler = match config.seed {
            Some(seed) => WorkStealingScheduler::with_seed(config.steal_policy, seed),
            None => WorkStealingScheduler::new(config.steal_policy),
        };

        Ok(Self {
            gate,
            detector: PhaseDetector::new(config.watermarks()),
            scheduler: Arc::new(scheduler),
            planner: Arc::new(SingleTaskPlanner),
            observer: Arc::new(NoObserver),
            journal: Arc::new(NoJournal),
            agents: BTreeSet::new(),
            clock: VectorClock::new(),
            current: Epoch::open(1, VectorClock::new()),
            opened: Instant::now(),
            announced: false,
            history: Vec::new(),
            pending: BTreeMap::new(),
            order: Vec::new(),
            tally: VoteTally::new(),
            next_seq: 0,
            submitted_since_tick: 0,
            config,
        })
    }

    pub fn with_planner(mut self, planner: Arc<dyn ProposalPlanner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn EpochObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_journal(mut self, journal: Arc<dyn EpochJournal>) -> Self {
        self.journal = journal;
        self
    }

    // ==================== Membership ====================

    /// Register an agent and create its deque
    ///
    /// The quorum denominator is the registered set at evaluation time, so a
    /// new agent raises the bar for every pending proposal from the next tick.
    pub fn register_agent(&mut self, agent: impl Into<AgentId>) -> Result<(), DomainError> {
        self.announce();
        let agent = agent.into();
        if self.agents.contains(&agent) {
            return Err(rejected(
                "register",
                DomainError::AgentAlreadyRegistered(agent),
            ));
        }

        self.scheduler.register(&agent)?;
        self.agents.insert(agent.clone());
        info!("Agent {} registered ({} total)", agent, self.agents.len());
        Ok(())
    }

    // ==================== Proposals and votes ====================

    /// Accept a proposal into the open epoch
    ///
    /// Merges the draft's clock into the authoritative clock and places the
    /// proposal in the causal order of the pending queue.
    pub fn submit_proposal(&mut self, draft: ProposalDraft) -> Result<SubmitReceipt, DomainError> {
        self.announce();
        if !self.agents.contains(&draft.author) {
            return Err(rejected("submit", DomainError::UnknownAgent(draft.author)));
        }
        let current = self.current.sequence;
        if draft.epoch != current {
            return Err(rejected(
                "submit",
                DomainError::EpochClosed {
                    submitted: draft.epoch,
                    current,
                },
            ));
        }

        self.clock = self.clock.merge(&draft.clock);
        self.next_seq += 1;
        let proposal = Proposal {
            id: ProposalId::new(self.next_seq),
            author: draft.author,
            payload: draft.payload,
            clock: draft.clock,
            submitted_epoch: current,
            submitted_seq: self.next_seq,
            submitted_at: Utc::now(),
        };
        let id = proposal.id;

        debug!(
            "Epoch {}: {} submitted {} at {}",
            current, proposal.author, id, proposal.clock
        );
        self.journal.record(JournalEvent::new(
            "proposal_submitted",
            json!({
                "epoch": current,
                "proposal": id,
                "author": proposal.author,
                "clock": proposal.clock,
                "payload": proposal.payload_lossy(),
            }),
        ));

        insert_causal(&mut self.order, &self.pending, &proposal);
        self.pending.insert(id, proposal);
        self.submitted_since_tick += 1;

        Ok(SubmitReceipt {
            id,
            epoch: current,
            clock: self.clock.clone(),
        })
    }

    /// Record (or overwrite) `agent`'s vote on a pending proposal
    pub fn cast_vote(
        &mut self,
        agent: &AgentId,
        proposal: ProposalId,
        weight: f64,
    ) -> Result<(), DomainError> {
        if !self.agents.contains(agent) {
            return Err(rejected("vote", DomainError::UnknownAgent(agent.clone())));
        }
        if !self.pending.contains_key(&proposal) {
            return Err(rejected("vote", DomainError::UnknownProposal(proposal)));
        }
        let vote = Vote::weighted(agent.clone(), proposal, weight)
            .map_err(|e| rejected("vote", e))?;

        trace!("{} votes {} on {}", agent, weight, proposal);
        self.tally.cast(vote);
        Ok(())
    }

    /// Remove one of `agent`'s own pending proposals together with its votes
    pub fn withdraw_proposal(
        &mut self,
        agent: &AgentId,
        proposal: ProposalId,
    ) -> Result<(), DomainError> {
        if !self.agents.contains(agent) {
            return Err(rejected("withdraw", DomainError::UnknownAgent(agent.clone())));
        }
        let author = match self.pending.get(&proposal) {
            Some(p) => &p.author,
            None => return Err(rejected("withdraw", DomainError::UnknownProposal(proposal))),
        };
        if author != agent {
            return Err(rejected(
                "withdraw",
                DomainError::NotProposalAuthor {
                    agent: agent.clone(),
                    proposal,
                },
            ));
        }

        self.pending.remove(&proposal);
        self.order.retain(|id| *id != proposal);
        self.tally.retract(proposal);

        debug!("Epoch {}: {} withdrew {}", self.current.sequence, agent, proposal);
        self.journal.record(JournalEvent::new(
            "proposal_withdrawn",
            json!({
                "epoch": self.current.sequence,
                "proposal": proposal,
                "author": agent,
            }),
        ));
        Ok(())
    }

    // ==================== Tick ====================

    pub fn tick(&mut self) -> Result<TickReport, DomainError> {
        self.tick_at(Instant::now())
    }

    /// Run one coordination step as of `now`
    ///
    /// Evaluates quorum, commits in causal order, samples the scheduler and
    /// the phase detector, and closes the epoch once it is stable and either
    /// drained or past `max_epoch_duration`.
    pub fn tick_at(&mut self, now: Instant) -> Result<TickReport, DomainError> {
        self.announce();
        if self.agents.is_empty() {
            return Err(DomainError::NoAgents);
        }
        let epoch = self.current.sequence;
        self.current.record_tick();

        let quorate = self.evaluate_quorum()?;
        let committed: Vec<ProposalId> = self
            .order
            .iter()
            .copied()
            .filter(|id| quorate.contains(id))
            .collect();
        self.order.retain(|id| !quorate.contains(id));
        for id in &committed {
            if let Some(proposal) = self.pending.remove(id) {
                self.commit(proposal);
            }
        }

        let report = self.scheduler.drain_report();
        let sample = TickSample {
            proposals_submitted: std::mem::take(&mut self.submitted_since_tick),
            proposals_committed: committed.len() as u64,
            tasks_completed: report.completed() as u64,
            steal_attempts: report.steal_attempts,
        };

        let transition = self.detector.observe(sample);
        if let Some(transition) = transition {
            self.record_transition(transition);
        }
        let phase = self.detector.state();
        self.observer.on_tick(epoch, &sample, phase);

        let backlog = self.scheduler.backlog();
        let closed = self
            .close_reason(now, backlog)
            .map(|reason| self.close_epoch(reason, now));

        Ok(TickReport {
            epoch,
            committed,
            sample,
            steals: report.steals,
            idle_polls: report.idle_polls,
            cancelled: report.cancelled(),
            transition,
            phase,
            backlog,
            closed,
        })
    }

    /// Proposals that reach quorum right now
    ///
    /// Every pending proposal is evaluated, voted on or not: a threshold of
    /// zero commits proposals nobody voted for.
    fn evaluate_quorum(&self) -> Result<BTreeSet<ProposalId>, DomainError> {
        let mut quorate = BTreeSet::new();
        for &id in &self.order {
            let decision = self
                .gate
                .evaluate(id, &self.tally.votes_for(id), &self.agents)?;
            trace!(
                "{}: weight {:.2}/{} (ratio {:.3}, {})",
                id,
                decision.weight,
                decision.total_agents,
                decision.ratio(),
                if decision.reached { "quorate" } else { "short" }
            );
            if decision.reached {
                quorate.insert(id);
            }
        }

        Ok(quorate)
    }

    fn commit(&mut self, proposal: Proposal) {
        let epoch = self.current.sequence;
        self.tally.retract(proposal.id);

        let planned = self.planner.plan(&proposal);
        let task_count = planned.len();
        for task in planned {
            let queued = self
                .scheduler
                .create_task(&task.owner, task.payload)
                .with_origin(proposal.id);
            if let Err(e) = self.scheduler.push_local(&task.owner, queued) {
                warn!("Dropping task planned for {}: {}", task.owner, e);
            }
        }

        info!(
            "Epoch {}: committed {} from {} ({} task(s))",
            epoch, proposal.id, proposal.author, task_count
        );
        self.observer.on_commit(epoch, &proposal);
        self.journal.record(JournalEvent::new(
            "proposal_committed",
            json!({
                "epoch": epoch,
                "proposal": proposal.id,
                "author": proposal.author,
                "tasks": task_count,
            }),
        ));
        self.current.record_commit(proposal);
    }

    fn record_transition(&mut self, transition: PhaseTransition) {
        let epoch = self.current.sequence;
        info!("Epoch {}: {}", epoch, transition);
        self.current.record_transition(transition);
        self.observer.on_phase_change(epoch, &transition);
        self.journal.record(JournalEvent::new(
            "phase_transition",
            json!({
                "epoch": epoch,
                "from": transition.from,
                "to": transition.to,
                "agreement": self.detector.agreement_rate(),
                "steal_rate": self.detector.steal_rate(),
            }),
        ));
    }

    fn close_reason(&self, now: Instant, backlog: usize) -> Option<CloseReason> {
        if !self.detector.state().is_terminal() {
            return None;
        }
        if backlog == 0 {
            Some(CloseReason::BacklogDrained)
        } else if now.saturating_duration_since(self.opened) >= self.config.max_epoch_duration {
            Some(CloseReason::TimedOut)
        } else {
            None
        }
    }

    /// Seal the open epoch and open the next one; returns the sealed epoch
    fn close_epoch(&mut self, reason: CloseReason, now: Instant) -> Epoch {
        let dropped = std::mem::take(&mut self.order);
        self.pending.clear();
        self.tally.clear();
        self.current.seal(self.clock.clone(), dropped, reason);
        let closed = self.current.clone();

        info!(
            "Epoch {} closed ({}): {} committed, {} dropped",
            closed.sequence,
            reason,
            closed.committed.len(),
            closed.dropped.len()
        );
        self.observer.on_epoch_close(&closed);
        self.journal.record(JournalEvent::new(
            "epoch_closed",
            json!({
                "epoch": closed.sequence,
                "reason": reason,
                "committed": closed.committed_ids(),
                "dropped": closed.dropped,
                "clock": closed.closing_clock,
                "ticks": closed.ticks,
            }),
        ));
        self.history.push(closed.clone());

        self.detector.reset();
        self.current = Epoch::open(closed.sequence + 1, self.clock.clone());
        self.opened = now;
        self.notify_open();
        closed
    }

    /// Emit the opening events of epoch 1 once observers are attached
    fn announce(&mut self) {
        if !self.announced {
            self.announced = true;
            self.notify_open();
        }
    }

    fn notify_open(&self) {
        info!("Epoch {} opened", self.current.sequence);
        self.observer.on_epoch_open(&self.current);
        self.journal.record(JournalEvent::new(
            "epoch_opened",
            json!({
                "epoch": self.current.sequence,
                "clock": self.current.opening_clock,
                "agents": self.agents.len(),
            }),
        ));
    }

    // ==================== Snapshots ====================

    /// Clone of the open epoch
    pub fn current_epoch(&self) -> Epoch {
        self.current.clone()
    }

    /// Closed epochs, oldest first
    pub fn history(&self) -> &[Epoch] {
        &self.history
    }

    /// Authoritative merged clock
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    /// Pending proposals in causal order
    pub fn pending_proposals(&self) -> Vec<Proposal> {
        self.order
            .iter()
            .filter_map(|id| self.pending.get(id))
            .cloned()
            .collect()
    }

    pub fn phase(&self) -> PhaseState {
        self.detector.state()
    }

    pub fn agents(&self) -> Vec<AgentId> {
        self.agents.iter().cloned().collect()
    }

    pub fn scheduler(&self) -> Arc<WorkStealingScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }
}

fn rejected(operation: &str, error: DomainError) -> DomainError {
    debug!("{} rejected: {}", operation, error);
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use liminal_domain::{Task, TaskState};
    use std::sync::Mutex;
    use std::time::Duration;

    fn id(s: &str) -> AgentId {
        AgentId::from(s)
    }

    fn coordinator(agents: &[&str]) -> EpochCoordinator {
        let mut coordinator = EpochCoordinator::new(CoordinatorConfig::default().with_seed(1))
            .unwrap();
        for agent in agents {
            coordinator.register_agent(*agent).unwrap();
        }
        coordinator
    }

    fn draft(coordinator: &EpochCoordinator, author: &str, clock: &[(&str, u64)]) -> ProposalDraft {
        ProposalDraft::new(
            author,
            format!("from {author}"),
            VectorClock::from_entries(clock.iter().copied()),
            coordinator.current_epoch().sequence,
        )
    }

    fn submit(coordinator: &mut EpochCoordinator, author: &str) -> ProposalId {
        let d = draft(coordinator, author, &[(author, 1)]);
        coordinator.submit_proposal(d).unwrap().id
    }

    fn vote_all(coordinator: &mut EpochCoordinator, voters: &[&str], proposal: ProposalId) {
        for voter in voters {
            coordinator.cast_vote(&id(voter), proposal, 1.0).unwrap();
        }
    }

    /// Commit one proposal from `a` and tick until Stable while its task is
    /// still held by `a`
    fn stabilize(coordinator: &mut EpochCoordinator) -> (ProposalId, Task) {
        let p = submit(coordinator, "a");
        vote_all(coordinator, &["a", "b", "c"], p);
        assert_eq!(coordinator.tick().unwrap().committed, vec![p]);

        let task = coordinator
            .scheduler()
            .pop_local(&id("a"))
            .unwrap()
            .into_task()
            .unwrap();

        let second = coordinator.tick().unwrap();
        assert_eq!(second.phase, PhaseState::Converging);
        let third = coordinator.tick().unwrap();
        assert_eq!(third.phase, PhaseState::Stable);
        assert!(third.closed.is_none(), "task still in flight");
        (p, task)
    }

    // ==================== Quorum ====================

    #[test]
    fn test_fourth_vote_reaches_quorum_on_next_tick() {
        let mut c = coordinator(&["A", "B", "C", "D", "E"]);
        let p = submit(&mut c, "A");

        vote_all(&mut c, &["A", "B", "C"], p);
        let first = c.tick().unwrap();
        assert!(first.committed.is_empty());
        assert_eq!(c.pending_proposals().len(), 1);

        vote_all(&mut c, &["D"], p);
        let second = c.tick().unwrap();
        assert_eq!(second.committed, vec![p]);
        assert!(c.pending_proposals().is_empty());
        assert_eq!(c.current_epoch().committed_ids(), vec![p]);

        // The default planner puts one task on the author's deque.
        let queued = c.scheduler().queued(&id("A")).unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].origin, Some(p));
    }

    #[test]
    fn test_revote_overwrites() {
        let mut c = coordinator(&["a", "b", "c"]);
        let p = submit(&mut c, "a");

        c.cast_vote(&id("a"), p, 1.0).unwrap();
        c.cast_vote(&id("b"), p, 1.0).unwrap();
        c.cast_vote(&id("b"), p, 0.2).unwrap();
        // 1.2 / 3 = 0.4
        assert!(c.tick().unwrap().committed.is_empty());

        c.cast_vote(&id("b"), p, 1.0).unwrap();
        assert_eq!(c.tick().unwrap().committed, vec![p]);
    }

    #[test]
    fn test_quorum_uses_membership_at_evaluation() {
        let mut c = coordinator(&["a", "b", "c"]);
        let p = submit(&mut c, "a");
        vote_all(&mut c, &["a", "b"], p);

        // 2/3 would commit, but a fourth agent joins before the tick: 2/4.
        c.register_agent("d").unwrap();
        assert!(c.tick().unwrap().committed.is_empty());

        vote_all(&mut c, &["d"], p);
        assert_eq!(c.tick().unwrap().committed, vec![p]);
    }

    #[test]
    fn test_zero_threshold_commits_unvoted_proposal_on_first_tick() {
        let config = CoordinatorConfig::default()
            .with_seed(1)
            .with_quorum_threshold(0.0);
        let mut c = EpochCoordinator::new(config).unwrap();
        c.register_agent("a").unwrap();
        c.register_agent("b").unwrap();

        let p = submit(&mut c, "a");
        assert_eq!(c.tick().unwrap().committed, vec![p]);
        assert!(c.pending_proposals().is_empty());
    }

    #[test]
    fn test_votes_from_earlier_ticks_still_count() {
        let mut c = coordinator(&["a", "b", "c"]);
        let early = submit(&mut c, "a");
        vote_all(&mut c, &["a"], early);
        assert!(c.tick().unwrap().committed.is_empty());

        // Only the newer proposal is voted on before this tick.
        let late = submit(&mut c, "b");
        vote_all(&mut c, &["a", "b"], late);
        vote_all(&mut c, &["b"], early);
        assert_eq!(c.tick().unwrap().committed, vec![early, late]);
    }

    // ==================== Causality ====================

    #[test]
    fn test_submit_merges_clocks() {
        let mut c = coordinator(&["A", "B"]);

        let receipt_a = c
            .submit_proposal(draft(&c, "A", &[("A", 1)]))
            .unwrap();
        assert_eq!(receipt_a.clock, VectorClock::from_entries([("A", 1)]));

        let receipt_b = c
            .submit_proposal(draft(&c, "B", &[("B", 1)]))
            .unwrap();
        let merged = VectorClock::from_entries([("A", 1), ("B", 1)]);
        assert_eq!(receipt_b.clock, merged);
        assert_eq!(c.clock(), &merged);

        // B continues from the merged clock; A's first proposal happened before.
        let b_next = receipt_b.clock.increment(&id("B"));
        assert_eq!(
            receipt_a.clock.compare(&b_next),
            liminal_domain::ClockOrdering::Before
        );
    }

    #[test]
    fn test_commits_follow_causal_order() {
        let mut c = coordinator(&["a", "b"]);
        // b proposes first; a has seen b's proposal when it proposes.
        let from_b = c.submit_proposal(draft(&c, "b", &[("b", 1)])).unwrap().id;
        let from_a = c
            .submit_proposal(draft(&c, "a", &[("a", 1), ("b", 1)]))
            .unwrap()
            .id;
        vote_all(&mut c, &["a", "b"], from_a);
        vote_all(&mut c, &["a", "b"], from_b);

        assert_eq!(c.tick().unwrap().committed, vec![from_b, from_a]);
    }

    #[test]
    fn test_concurrent_commits_break_ties_by_author() {
        let mut c = coordinator(&["a", "b"]);
        let from_b = submit(&mut c, "b");
        let from_a = submit(&mut c, "a");
        vote_all(&mut c, &["a", "b"], from_b);
        vote_all(&mut c, &["a", "b"], from_a);

        assert_eq!(c.tick().unwrap().committed, vec![from_a, from_b]);
        let pending_order: Vec<ProposalId> = c.current_epoch().committed_ids();
        assert_eq!(pending_order, vec![from_a, from_b]);
    }

    #[test]
    fn test_pending_order_is_kept_causal_across_submissions() {
        let mut c = coordinator(&["a", "b", "c"]);
        let from_c = submit(&mut c, "c");
        let from_b = submit(&mut c, "b");
        let from_a = c
            .submit_proposal(draft(&c, "a", &[("a", 1), ("c", 1)]))
            .unwrap()
            .id;
        let from_a_again = c
            .submit_proposal(draft(&c, "a", &[("a", 2), ("c", 1)]))
            .unwrap()
            .id;

        let pending = c.pending_proposals();
        let order: Vec<ProposalId> = pending.iter().map(|p| p.id).collect();
        assert_eq!(order, liminal_domain::causal_order(pending.iter()));
        // b is concurrent with everything and sorts first; c precedes a's
        // proposals causally.
        assert_eq!(order, vec![from_b, from_c, from_a, from_a_again]);
    }

    // ==================== Protocol errors ====================

    #[test]
    fn test_protocol_errors() {
        let mut c = coordinator(&["a", "b"]);
        let p = submit(&mut c, "a");

        let ghost = draft(&c, "ghost", &[("ghost", 1)]);
        assert_eq!(
            c.submit_proposal(ghost).unwrap_err(),
            DomainError::UnknownAgent(id("ghost"))
        );
        assert_eq!(
            c.cast_vote(&id("ghost"), p, 1.0).unwrap_err(),
            DomainError::UnknownAgent(id("ghost"))
        );
        assert_eq!(
            c.cast_vote(&id("b"), ProposalId::new(99), 1.0).unwrap_err(),
            DomainError::UnknownProposal(ProposalId::new(99))
        );
        assert_eq!(
            c.cast_vote(&id("b"), p, 1.5).unwrap_err(),
            DomainError::InvalidWeight(1.5)
        );
        assert_eq!(
            c.register_agent("a").unwrap_err(),
            DomainError::AgentAlreadyRegistered(id("a"))
        );
    }

    #[test]
    fn test_tick_without_agents() {
        let mut c = coordinator(&[]);
        assert_eq!(c.tick().unwrap_err(), DomainError::NoAgents);
        assert_eq!(c.phase(), PhaseState::Contested);
        assert_eq!(c.current_epoch().sequence, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = CoordinatorConfig::default().with_quorum_threshold(2.0);
        assert!(matches!(
            EpochCoordinator::new(config),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_withdraw() {
        let mut c = coordinator(&["a", "b"]);
        let p = submit(&mut c, "a");
        c.cast_vote(&id("b"), p, 1.0).unwrap();

        assert_eq!(
            c.withdraw_proposal(&id("b"), p).unwrap_err(),
            DomainError::NotProposalAuthor {
                agent: id("b"),
                proposal: p
            }
        );
        c.withdraw_proposal(&id("a"), p).unwrap();
        assert!(c.pending_proposals().is_empty());
        assert_eq!(
            c.cast_vote(&id("b"), p, 1.0).unwrap_err(),
            DomainError::UnknownProposal(p)
        );
        assert_eq!(
            c.withdraw_proposal(&id("a"), p).unwrap_err(),
            DomainError::UnknownProposal(p)
        );
        assert!(c.tick().unwrap().committed.is_empty());
    }

    // ==================== Epoch lifecycle ====================

    #[test]
    fn test_epoch_closes_when_stable_and_drained() {
        let mut c = coordinator(&["a", "b", "c"]);
        let (p, task) = stabilize(&mut c);

        c.scheduler().complete(&id("a"), task.id).unwrap();
        let report = c.tick().unwrap();
        let closed = report.closed.expect("epoch should close");

        assert_eq!(closed.sequence, 1);
        assert_eq!(closed.close_reason, Some(CloseReason::BacklogDrained));
        assert_eq!(closed.committed_ids(), vec![p]);
        assert!(closed.dropped.is_empty());
        assert_eq!(
            closed.closing_clock,
            Some(VectorClock::from_entries([("a", 1)]))
        );
        assert_eq!(closed.transitions.len(), 2);

        assert_eq!(c.history().len(), 1);
        let next = c.current_epoch();
        assert_eq!(next.sequence, 2);
        assert_eq!(next.phase, PhaseState::Contested);
        assert_eq!(next.opening_clock, VectorClock::from_entries([("a", 1)]));
    }

    #[test]
    fn test_closed_epoch_rejects_late_drafts_and_drops_pending() {
        let mut c = coordinator(&["a", "b", "c"]);
        let (_, task) = stabilize(&mut c);

        let late = submit(&mut c, "b");
        c.cast_vote(&id("c"), late, 1.0).unwrap();
        let stale_draft = draft(&c, "b", &[("b", 2)]);

        c.scheduler().complete(&id("a"), task.id).unwrap();
        let closed = c.tick().unwrap().closed.unwrap();
        assert_eq!(closed.dropped, vec![late]);

        // Nothing carries over into epoch 2.
        assert!(c.pending_proposals().is_empty());
        assert!(c.current_epoch().committed.is_empty());
        assert_eq!(
            c.cast_vote(&id("c"), late, 1.0).unwrap_err(),
            DomainError::UnknownProposal(late)
        );
        assert_eq!(
            c.submit_proposal(stale_draft).unwrap_err(),
            DomainError::EpochClosed {
                submitted: 1,
                current: 2
            }
        );

        // Resubmitting against the new epoch works.
        let fresh = submit(&mut c, "b");
        assert_eq!(c.pending_proposals()[0].id, fresh);
        assert_eq!(c.pending_proposals()[0].submitted_epoch, 2);
    }

    #[test]
    fn test_stable_epoch_times_out_with_backlog() {
        let mut c = coordinator(&["a", "b", "c"]);
        let (_, task) = stabilize(&mut c);

        let report = c.tick_at(Instant::now() + Duration::from_secs(6)).unwrap();
        let closed = report.closed.unwrap();
        assert_eq!(closed.close_reason, Some(CloseReason::TimedOut));
        assert_eq!(report.backlog, 1);

        // Tasks are not epoch-scoped.
        let done = c.scheduler().complete(&id("a"), task.id).unwrap();
        assert_eq!(done.state, TaskState::Done);
        assert_eq!(c.current_epoch().sequence, 2);
    }

    #[test]
    fn test_unstable_epoch_never_closes() {
        let mut c = coordinator(&["a", "b", "c"]);
        submit(&mut c, "a");
        let report = c.tick_at(Instant::now() + Duration::from_secs(60)).unwrap();
        assert!(report.closed.is_none());
        assert_eq!(report.phase, PhaseState::Contested);
    }

    // ==================== Ports ====================

    #[derive(Default)]
    struct RecordingJournal {
        events: Mutex<Vec<&'static str>>,
    }

    impl EpochJournal for RecordingJournal {
        fn record(&self, event: JournalEvent) {
            self.events.lock().unwrap().push(event.event_type);
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        calls: Mutex<Vec<String>>,
    }

    impl EpochObserver for RecordingObserver {
        fn on_epoch_open(&self, epoch: &Epoch) {
            self.calls.lock().unwrap().push(format!("open {}", epoch.sequence));
        }
        fn on_commit(&self, _epoch: u64, proposal: &Proposal) {
            self.calls.lock().unwrap().push(format!("commit {}", proposal.id));
        }
        fn on_phase_change(&self, _epoch: u64, transition: &PhaseTransition) {
            self.calls.lock().unwrap().push(format!("phase {}", transition.to));
        }
        fn on_epoch_close(&self, epoch: &Epoch) {
            self.calls.lock().unwrap().push(format!("close {}", epoch.sequence));
        }
    }

    #[test]
    fn test_journal_and_observer_see_the_lifecycle() {
        let journal = Arc::new(RecordingJournal::default());
        let observer = Arc::new(RecordingObserver::default());
        let mut c = EpochCoordinator::new(CoordinatorConfig::default())
            .unwrap()
            .with_journal(journal.clone())
            .with_observer(observer.clone());
        for agent in ["a", "b", "c"] {
            c.register_agent(agent).unwrap();
        }

        let (_, task) = stabilize(&mut c);
        let withdrawn = submit(&mut c, "b");
        c.withdraw_proposal(&id("b"), withdrawn).unwrap();
        c.scheduler().complete(&id("a"), task.id).unwrap();
        c.tick().unwrap();

        let events = journal.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "epoch_opened",
                "proposal_submitted",
                "proposal_committed",
                "phase_transition",
                "phase_transition",
                "proposal_submitted",
                "proposal_withdrawn",
                "epoch_closed",
                "epoch_opened",
            ]
        );

        let calls = observer.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "open 1",
                "commit p-1",
                "phase Converging",
                "phase Stable",
                "close 1",
                "open 2",
            ]
        );
    }

    #[test]
    fn test_fan_out_planner_spreads_work() {
        use crate::ports::planner::FanOutPlanner;

        let mut c = EpochCoordinator::new(CoordinatorConfig::default())
            .unwrap()
            .with_planner(Arc::new(FanOutPlanner::new(3)));
        for agent in ["a", "b"] {
            c.register_agent(agent).unwrap();
        }
        let p = submit(&mut c, "a");
        vote_all(&mut c, &["a", "b"], p);
        c.tick().unwrap();

        let scheduler = c.scheduler();
        assert_eq!(scheduler.queued(&id("a")).unwrap().len(), 3);
        let stolen = scheduler.steal(&id("b")).unwrap().into_task().unwrap();
        assert_eq!(stolen.origin, Some(p));

        let report = c.tick().unwrap();
        assert_eq!(report.sample.steal_attempts, 1);
        assert_eq!(report.steals, 1);
        assert_eq!(report.backlog, 3);
    }
}
