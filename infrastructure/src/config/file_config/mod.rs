//! Raw TOML configuration data types
//!
//! These structs mirror the config file. Conversion into domain and
//! application types happens through the `to_*` methods, which is where
//! validation errors surface.

mod coordinator;
mod journal;
mod output;
mod swarm;

pub use coordinator::FileCoordinatorConfig;
pub use journal::FileJournalConfig;
pub use output::FileOutputConfig;
pub use swarm::FileSwarmConfig;

use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Quorum, phase and scheduler tuning
    pub coordinator: FileCoordinatorConfig,
    /// Structured epoch journal
    pub journal: FileJournalConfig,
    /// Swarm simulation settings
    pub swarm: FileSwarmConfig,
    /// Output settings
    pub output: FileOutputConfig,
}
