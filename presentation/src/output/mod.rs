//! Output formatting for swarm results

pub mod console;
pub mod formatter;
