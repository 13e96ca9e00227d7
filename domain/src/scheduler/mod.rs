//! Work distribution
//!
//! Tasks produced by committed proposals are spread across per-agent deques;
//! idle agents steal from busier peers.

pub mod policy;
pub mod task;
pub mod work_stealing;

pub use policy::StealPolicy;
pub use task::{Task, TaskId, TaskPoll, TaskState};
pub use work_stealing::{FinishedTask, SchedulerReport, SchedulerTotals, WorkStealingScheduler};
