//! Logical time
//!
//! [`VectorClock`] establishes causal (not wall-clock) order between
//! proposals, within and across epochs.

pub mod vector_clock;

pub use vector_clock::{ClockOrdering, VectorClock};
