//! Epoch observer port
//!
//! Defines the interface for reporting epoch progress while the coordinator
//! runs.

use liminal_domain::{Epoch, PhaseState, PhaseTransition, Proposal, TickSample};

/// Callback for epoch lifecycle events
///
/// Implementations live in the presentation layer and can display progress
/// in various ways (progress bars, plain log lines, etc.). Callbacks run on
/// the coordinator's task and must not block.
pub trait EpochObserver: Send + Sync {
    /// Called when an epoch opens
    fn on_epoch_open(&self, epoch: &Epoch);

    /// Called for every committed proposal, in commit order
    fn on_commit(&self, epoch: u64, proposal: &Proposal);

    /// Called when the phase detector moves the epoch forward
    fn on_phase_change(&self, epoch: u64, transition: &PhaseTransition);

    /// Called with the sealed epoch once it closes
    fn on_epoch_close(&self, epoch: &Epoch);

    /// Called after every coordinator tick
    fn on_tick(&self, _epoch: u64, _sample: &TickSample, _phase: PhaseState) {}
}

/// No-op observer for when progress reporting is not needed
pub struct NoObserver;

impl EpochObserver for NoObserver {
    fn on_epoch_open(&self, _epoch: &Epoch) {}
    fn on_commit(&self, _epoch: u64, _proposal: &Proposal) {}
    fn on_phase_change(&self, _epoch: u64, _transition: &PhaseTransition) {}
    fn on_epoch_close(&self, _epoch: &Epoch) {}
}
