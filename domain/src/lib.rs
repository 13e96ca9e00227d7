//! Domain layer for liminal
//!
//! This crate contains the core coordination logic, entities, and value
//! objects. It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Epochs
//!
//! A swarm of agents works in bounded rounds called epochs. During an epoch
//! agents submit proposals and vote on them; proposals that reach quorum
//! commit and spawn tasks, which are balanced across agents by work stealing.
//!
//! ## Phases
//!
//! Each epoch moves through `Contested → Converging → Stable`. The phase
//! detector reads per-tick activity and decides when the swarm has settled
//! enough for the epoch to close.
//!
//! ## Causality
//!
//! Vector clocks order proposals causally, independent of wall-clock time.

pub mod agent;
pub mod clock;
pub mod config;
pub mod core;
pub mod epoch;
pub mod phase;
pub mod quorum;
pub mod scheduler;

// Re-export commonly used types
pub use agent::AgentId;
pub use clock::{ClockOrdering, VectorClock};
pub use config::{ConfigError, CoordinatorConfig, OutputFormat};
pub use core::error::DomainError;
pub use epoch::{
    CloseReason, Epoch, Proposal, ProposalDraft, ProposalId, causal_order, insert_causal,
    tie_break,
};
pub use phase::{PhaseDetector, PhaseState, PhaseTransition, PhaseWatermarks, TickSample};
pub use quorum::{
    DEFAULT_QUORUM_THRESHOLD, DEFAULT_VOTE_WEIGHT, QuorumDecision, QuorumGate, Vote, VoteTally,
    quorum_reached,
};
pub use scheduler::{
    FinishedTask, SchedulerReport, SchedulerTotals, StealPolicy, Task, TaskId, TaskPoll,
    TaskState, WorkStealingScheduler,
};
