//! Work-stealing scheduler
//!
//! Every registered agent owns a deque. The owner pushes and pops at the
//! tail (LIFO, keeps recently produced work local); thieves take from the
//! head (FIFO, the end the owner is least likely to touch). Each deque sits
//! behind its own mutex, so an owner popping and a thief stealing serialize
//! on that deque only. A steal locks victim and thief together, ordered by
//! agent id, and moves the task in one step: a task is never duplicated and
//! never lost in transit.
//!
//! The scheduler reports back to the coordinator through
//! [`WorkStealingScheduler::drain_report`]: tasks finished since the last
//! drain and steal statistics for the phase detector.

use super::policy::StealPolicy;
use super::task::{Task, TaskId, TaskPoll, TaskState};
use crate::agent::AgentId;
use crate::core::error::DomainError;
use crate::epoch::ProposalId;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Rescans allowed when a chosen victim drains before it can be locked
const MAX_STEAL_RETRIES: usize = 8;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One agent's queue plus the tasks it is currently working on
#[derive(Debug, Default)]
struct AgentDeque {
    queue: VecDeque<Task>,
    in_flight: BTreeMap<TaskId, Task>,
}

type SharedDeque = Arc<Mutex<AgentDeque>>;

/// A task that reached a terminal state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedTask {
    pub id: TaskId,
    pub agent: AgentId,
    pub origin: Option<ProposalId>,
    pub state: TaskState,
}

/// Activity since the previous [`WorkStealingScheduler::drain_report`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerReport {
    pub finished: Vec<FinishedTask>,
    /// Steals that found queued work on another agent
    pub steal_attempts: u64,
    /// Steals that moved a task
    pub steals: u64,
    /// Steals that found no queued work anywhere
    pub idle_polls: u64,
}

impl SchedulerReport {
    pub fn completed(&self) -> usize {
        self.finished
            .iter()
            .filter(|t| t.state == TaskState::Done)
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.finished
            .iter()
            .filter(|t| t.state == TaskState::Cancelled)
            .count()
    }
}

/// Cumulative task accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerTotals {
    pub pushed: u64,
    pub done: u64,
    pub cancelled: u64,
    pub queued: u64,
    pub in_flight: u64,
}

impl SchedulerTotals {
    /// Every task ever pushed is accounted for exactly once
    ///
    /// Only meaningful while no operation is running concurrently.
    pub fn is_conserved(&self) -> bool {
        self.done + self.cancelled + self.queued + self.in_flight == self.pushed
    }

    /// Tasks not yet in a terminal state
    pub fn backlog(&self) -> u64 {
        self.queued + self.in_flight
    }
}

#[derive(Debug, Default)]
struct Counters {
    next_task_id: AtomicU64,
    pushed: AtomicU64,
    done: AtomicU64,
    cancelled: AtomicU64,
    steal_attempts: AtomicU64,
    steals: AtomicU64,
    idle_polls: AtomicU64,
}

/// Per-agent deques with stealing
///
/// Shared between the coordinator and agent tasks behind an `Arc`; every
/// method takes `&self`.
#[derive(Debug)]
pub struct WorkStealingScheduler {
    policy: StealPolicy,
    deques: RwLock<BTreeMap<AgentId, SharedDeque>>,
    rng: Mutex<SmallRng>,
    counters: Counters,
    finished: Mutex<Vec<FinishedTask>>,
}

impl Default for WorkStealingScheduler {
    fn default() -> Self {
        Self::new(StealPolicy::default())
    }
}

impl WorkStealingScheduler {
    pub fn new(policy: StealPolicy) -> Self {
        Self::with_rng(policy, SmallRng::from_os_rng())
    }

    /// Deterministic victim selection for the `Random` policy
    pub fn with_seed(policy: StealPolicy, seed: u64) -> Self {
        Self::with_rng(policy, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(policy: StealPolicy, rng: SmallRng) -> Self {
        Self {
            policy,
            deques: RwLock::new(BTreeMap::new()),
            rng: Mutex::new(rng),
            counters: Counters::default(),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn policy(&self) -> StealPolicy {
        self.policy
    }

    // ==================== Membership ====================

    /// Create an empty deque for `agent`
    pub fn register(&self, agent: &AgentId) -> Result<(), DomainError> {
        let mut deques = self.deques.write().unwrap_or_else(PoisonError::into_inner);
        if deques.contains_key(agent) {
            return Err(DomainError::AgentAlreadyRegistered(agent.clone()));
        }
        deques.insert(agent.clone(), Arc::new(Mutex::new(AgentDeque::default())));
        Ok(())
    }

    pub fn is_registered(&self, agent: &AgentId) -> bool {
        self.read_deques().contains_key(agent)
    }

    pub fn agents(&self) -> Vec<AgentId> {
        self.read_deques().keys().cloned().collect()
    }

    fn read_deques(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<AgentId, SharedDeque>> {
        self.deques.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn deque(&self, agent: &AgentId) -> Result<SharedDeque, DomainError> {
        self.read_deques()
            .get(agent)
            .cloned()
            .ok_or_else(|| DomainError::UnknownAgent(agent.clone()))
    }

    /// Clone the deque handles so no map lock is held while deques are locked
    fn snapshot(&self) -> Vec<(AgentId, SharedDeque)> {
        self.read_deques()
            .iter()
            .map(|(agent, deque)| (agent.clone(), Arc::clone(deque)))
            .collect()
    }

    // ==================== Owner operations ====================

    /// Build a task with a fresh id (not yet queued)
    pub fn create_task(&self, owner: &AgentId, payload: impl Into<Vec<u8>>) -> Task {
        let id = self.counters.next_task_id.fetch_add(1, Ordering::Relaxed) + 1;
        Task::new(TaskId::new(id), owner.clone(), payload)
    }

    /// Append `task` to the tail of `agent`'s deque
    pub fn push_local(&self, agent: &AgentId, mut task: Task) -> Result<TaskId, DomainError> {
        let deque = self.deque(agent)?;
        task.owner = agent.clone();
        task.state = TaskState::Pending;
        let id = task.id;

        // Counted before it becomes visible so `backlog` never undercounts.
        self.counters.pushed.fetch_add(1, Ordering::SeqCst);
        lock(&deque).queue.push_back(task);
        Ok(id)
    }

    /// Take the newest task from the tail of `agent`'s own deque
    pub fn pop_local(&self, agent: &AgentId) -> Result<TaskPoll, DomainError> {
        let deque = self.deque(agent)?;
        let mut guard = lock(&deque);

        let Some(mut task) = guard.queue.pop_back() else {
            return Ok(TaskPoll::NoWorkAvailable);
        };
        task.state = TaskState::InProgress;
        guard.in_flight.insert(task.id, task.clone());
        Ok(TaskPoll::Ready(task))
    }

    /// Take the oldest task from the head of another agent's deque
    ///
    /// The victim is chosen by the configured [`StealPolicy`]; the thief is
    /// never its own victim. Returns `NoWorkAvailable` when every other deque
    /// is empty.
    ///
    /// A steal that finds no queued work anywhere counts as an idle poll, not
    /// a steal attempt.
    pub fn steal(&self, thief: &AgentId) -> Result<TaskPoll, DomainError> {
        let thief_deque = self.deque(thief)?;
        let mut found_victim = false;

        for _ in 0..MAX_STEAL_RETRIES {
            let Some((victim_id, victim)) = self.pick_victim(thief) else {
                break;
            };
            found_victim = true;

            let (mut victim_guard, mut thief_guard) = if victim_id < *thief {
                let v = lock(&victim);
                let t = lock(&thief_deque);
                (v, t)
            } else {
                let t = lock(&thief_deque);
                let v = lock(&victim);
                (v, t)
            };

            // The victim may have drained between the scan and the lock.
            if let Some(mut task) = victim_guard.queue.pop_front() {
                task.owner = thief.clone();
                task.state = TaskState::Stolen;
                thief_guard.in_flight.insert(task.id, task.clone());
                self.counters.steal_attempts.fetch_add(1, Ordering::Relaxed);
                self.counters.steals.fetch_add(1, Ordering::Relaxed);
                return Ok(TaskPoll::Ready(task));
            }
        }

        if found_victim {
            self.counters.steal_attempts.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.idle_polls.fetch_add(1, Ordering::Relaxed);
        }
        Ok(TaskPoll::NoWorkAvailable)
    }

    fn pick_victim(&self, thief: &AgentId) -> Option<(AgentId, SharedDeque)> {
        let candidates: Vec<(AgentId, SharedDeque, usize)> = self
            .snapshot()
            .into_iter()
            .filter(|(agent, _)| agent != thief)
            .map(|(agent, deque)| {
                let len = lock(&deque).queue.len();
                (agent, deque, len)
            })
            .filter(|(_, _, len)| *len > 0)
            .collect();

        if candidates.is_empty() {
            return None;
        }

        let chosen = match self.policy {
            StealPolicy::Busiest => {
                // Candidates are in agent-id order; strict `>` keeps the
                // lowest id on ties.
                let mut best = 0;
                for (i, (_, _, len)) in candidates.iter().enumerate() {
                    if *len > candidates[best].2 {
                        best = i;
                    }
                }
                best
            }
            StealPolicy::Random => lock(&self.rng).random_range(0..candidates.len()),
        };

        candidates
            .into_iter()
            .nth(chosen)
            .map(|(agent, deque, _)| (agent, deque))
    }

    /// Own work first, then steal
    pub fn pop_task(&self, agent: &AgentId) -> Result<TaskPoll, DomainError> {
        match self.pop_local(agent)? {
            TaskPoll::NoWorkAvailable => self.steal(agent),
            ready => Ok(ready),
        }
    }

    // ==================== Completion ====================

    /// Mark a task held by `agent` as done
    ///
    /// Only tasks the agent has popped or stolen can be completed.
    pub fn complete(&self, agent: &AgentId, task_id: TaskId) -> Result<Task, DomainError> {
        let deque = self.deque(agent)?;
        let mut task = lock(&deque)
            .in_flight
            .remove(&task_id)
            .ok_or(DomainError::UnknownTask(task_id))?;

        task.state = TaskState::Done;
        self.counters.done.fetch_add(1, Ordering::SeqCst);
        self.record_finished(&task);
        Ok(task)
    }

    /// Abandon a queued or in-flight task of `agent`
    pub fn cancel(&self, agent: &AgentId, task_id: TaskId) -> Result<Task, DomainError> {
        let deque = self.deque(agent)?;
        let mut task = {
            let mut guard = lock(&deque);
            match guard.in_flight.remove(&task_id) {
                Some(task) => task,
                None => {
                    let position = guard
                        .queue
                        .iter()
                        .position(|t| t.id == task_id)
                        .ok_or(DomainError::UnknownTask(task_id))?;
                    guard
                        .queue
                        .remove(position)
                        .ok_or(DomainError::UnknownTask(task_id))?
                }
            }
        };

        task.state = TaskState::Cancelled;
        self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
        self.record_finished(&task);
        Ok(task)
    }

    fn record_finished(&self, task: &Task) {
        lock(&self.finished).push(FinishedTask {
            id: task.id,
            agent: task.owner.clone(),
            origin: task.origin,
            state: task.state,
        });
    }

    // ==================== Reporting ====================

    /// Hand finished tasks and steal counters to the coordinator, resetting them
    pub fn drain_report(&self) -> SchedulerReport {
        SchedulerReport {
            finished: std::mem::take(&mut *lock(&self.finished)),
            steal_attempts: self.counters.steal_attempts.swap(0, Ordering::Relaxed),
            steals: self.counters.steals.swap(0, Ordering::Relaxed),
            idle_polls: self.counters.idle_polls.swap(0, Ordering::Relaxed),
        }
    }

    /// Queued tasks of one agent, head first
    pub fn queued(&self, agent: &AgentId) -> Result<Vec<Task>, DomainError> {
        let deque = self.deque(agent)?;
        let guard = lock(&deque);
        Ok(guard.queue.iter().cloned().collect())
    }

    /// Tasks pushed but not yet done or cancelled, across all agents
    ///
    /// Derived from the counters rather than by visiting each deque, so a
    /// task moving between deques during the read is never missed. A task
    /// that is counted as pushed before it is queued, and counted as
    /// finished after it leaves its deque, can only make a concurrent read
    /// too high. Terminal counters are read before `pushed` for the same
    /// reason.
    pub fn backlog(&self) -> usize {
        let done = self.counters.done.load(Ordering::SeqCst);
        let cancelled = self.counters.cancelled.load(Ordering::SeqCst);
        let pushed = self.counters.pushed.load(Ordering::SeqCst);
        pushed.saturating_sub(done + cancelled) as usize
    }

    pub fn totals(&self) -> SchedulerTotals {
        let (queued, in_flight) = self
            .snapshot()
            .iter()
            .map(|(_, deque)| {
                let guard = lock(deque);
                (guard.queue.len() as u64, guard.in_flight.len() as u64)
            })
            .fold((0, 0), |(q, f), (dq, df)| (q + dq, f + df));

        SchedulerTotals {
            pushed: self.counters.pushed.load(Ordering::SeqCst),
            done: self.counters.done.load(Ordering::SeqCst),
            cancelled: self.counters.cancelled.load(Ordering::SeqCst),
            queued,
            in_flight,
        }
    }
}
