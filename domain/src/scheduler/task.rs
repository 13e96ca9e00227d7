//! Task value objects for the work-stealing scheduler
//!
//! # Identifiers
//! - [`TaskId`] - Sequential task identifier assigned by the scheduler
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──pop_local──▶ InProgress ──complete──▶ Done
//! Pending ──steal──────▶ Stolen ─────complete──▶ Done
//! any non-terminal ──cancel──▶ Cancelled
//! ```

use crate::agent::AgentId;
use crate::epoch::ProposalId;
use serde::{Deserialize, Serialize};

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t-{}", self.0)
    }
}

/// State of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Queued on its owner's deque
    #[default]
    Pending,
    /// Popped by its owner and being worked on
    InProgress,
    /// Taken from another agent's deque and being worked on by the thief
    Stolen,
    /// Finished by the agent holding it
    Done,
    /// Abandoned before completion
    Cancelled,
}

impl TaskState {
    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Pending => "pending",
            TaskState::InProgress => "in_progress",
            TaskState::Stolen => "stolen",
            TaskState::Done => "done",
            TaskState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Cancelled)
    }

    /// Held by an agent but not yet finished
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TaskState::InProgress | TaskState::Stolen)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit of work held by exactly one agent at a time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Current queue holder
    pub owner: AgentId,
    pub payload: Vec<u8>,
    /// Committed proposal this task was derived from
    pub origin: Option<ProposalId>,
    pub state: TaskState,
}

impl Task {
    pub fn new(id: TaskId, owner: impl Into<AgentId>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            owner: owner.into(),
            payload: payload.into(),
            origin: None,
            state: TaskState::Pending,
        }
    }

    pub fn with_origin(mut self, proposal: ProposalId) -> Self {
        self.origin = Some(proposal);
        self
    }
}

/// Result of asking the scheduler for work
///
/// `NoWorkAvailable` is a normal empty result, not an error: the caller
/// backs off and asks again.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPoll {
    Ready(Task),
    NoWorkAvailable,
}

impl TaskPoll {
    pub fn is_ready(&self) -> bool {
        matches!(self, TaskPoll::Ready(_))
    }

    pub fn into_task(self) -> Option<Task> {
        match self {
            TaskPoll::Ready(task) => Some(task),
            TaskPoll::NoWorkAvailable => None,
        }
    }
}

impl From<Option<Task>> for TaskPoll {
    fn from(task: Option<Task>) -> Self {
        match task {
            Some(task) => TaskPoll::Ready(task),
            None => TaskPoll::NoWorkAvailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_defaults() {
        let task = Task::new(TaskId::new(3), "x", b"payload".to_vec());
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.owner, AgentId::from("x"));
        assert!(task.origin.is_none());
        assert_eq!(task.id.to_string(), "t-3");
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Stolen.is_terminal());
        assert!(TaskState::Stolen.is_in_flight());
        assert!(!TaskState::Pending.is_in_flight());
    }

    #[test]
    fn test_poll_conversions() {
        let task = Task::new(TaskId::new(1), "x", Vec::<u8>::new());
        assert!(TaskPoll::from(Some(task.clone())).is_ready());
        assert_eq!(TaskPoll::from(None), TaskPoll::NoWorkAvailable);
        assert_eq!(TaskPoll::Ready(task.clone()).into_task(), Some(task));
    }
}
