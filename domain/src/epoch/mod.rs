//! Epoch domain
//!
//! An epoch is one turn of the shared process: proposals are submitted and
//! voted on, quorate ones commit, and the epoch closes once the phase
//! detector reports the system stable.

pub mod entities;
pub mod ordering;
pub mod proposal;

pub use entities::{CloseReason, Epoch};
pub use ordering::{causal_order, insert_causal, tie_break};
pub use proposal::{Proposal, ProposalDraft, ProposalId};
