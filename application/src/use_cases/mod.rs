//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod coordinator;
pub mod run_swarm;
pub mod service;
