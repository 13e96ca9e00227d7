//! Configuration file loading for liminal
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `LIMINAL_*` environment variables (`__` separates sections)
//! 2. `--config <path>` specified file
//! 3. Project root: `./liminal.toml` or `./.liminal.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/liminal/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileConfig, FileCoordinatorConfig, FileJournalConfig, FileOutputConfig, FileSwarmConfig,
};
pub use loader::ConfigLoader;
