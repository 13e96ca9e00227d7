//! Port for the structured epoch journal.
//!
//! Defines the [`EpochJournal`] trait for recording coordinator events
//! (epochs opening and closing, proposals submitted, committed and withdrawn,
//! phase transitions) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port captures the coordination
//! history in a machine-readable format (JSONL).

use serde_json::Value;

/// A structured coordinator event for the journal.
///
/// Each event has a type string and a JSON payload with event-specific
/// fields. Adapters add the timestamp when they write it.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEvent {
    /// Event type identifier (e.g., "epoch_opened", "proposal_committed").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl JournalEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for recording coordinator events.
///
/// Implementations write each event as a single record (e.g., one JSONL
/// line). `record` is synchronous and infallible: journal failures must not
/// stall the coordinator, adapters log them and carry on.
pub trait EpochJournal: Send + Sync {
    /// Record a coordinator event.
    fn record(&self, event: JournalEvent);
}

/// No-op implementation for tests and when the journal is disabled.
pub struct NoJournal;

impl EpochJournal for NoJournal {
    fn record(&self, _event: JournalEvent) {}
}
