//! Application layer for liminal
//!
//! This crate contains the epoch coordinator, its async service wrapper, the
//! swarm simulation use case, and the port definitions adapters implement.
//! It depends only on the domain layer.

pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use ports::{
    coordinator_port::{CoordinatorError, CoordinatorPort, SubmitReceipt},
    journal::{EpochJournal, JournalEvent, NoJournal},
    observer::{EpochObserver, NoObserver},
    planner::{FanOutPlanner, PlannedTask, ProposalPlanner, SingleTaskPlanner},
};
pub use use_cases::coordinator::{EpochCoordinator, TickReport};
pub use use_cases::run_swarm::{RunSwarmError, RunSwarmInput, RunSwarmUseCase, SwarmOutcome};
pub use use_cases::service::{AgentHandle, CoordinatorHandle, CoordinatorService};
