//! Agent domain module
//!
//! Agents are addressed only by [`AgentId`]; the coordinator and the
//! scheduler look them up by id, agents never hold references to each other.

pub mod value_objects;

pub use value_objects::AgentId;
