//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure and presentation adapters
//! implement, plus the host API agents call.

pub mod coordinator_port;
pub mod journal;
pub mod observer;
pub mod planner;
