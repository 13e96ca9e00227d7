//! Logging infrastructure: the structured epoch journal.
//!
//! Provides [`JsonlEpochJournal`], a JSONL file writer that implements
//! the [`EpochJournal`](liminal_application::EpochJournal) port.

mod jsonl_journal;

pub use jsonl_journal::JsonlEpochJournal;
