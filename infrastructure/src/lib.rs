//! Infrastructure layer for liminal
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: configuration file loading and the
//! JSONL epoch journal.

pub mod config;
pub mod logging;

// Re-export commonly used types
pub use config::{
    ConfigLoader, FileConfig, FileCoordinatorConfig, FileJournalConfig, FileOutputConfig,
    FileSwarmConfig,
};
pub use logging::JsonlEpochJournal;
