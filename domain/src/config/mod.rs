//! Configuration value objects for the domain layer
//!
//! These are validated in the domain so that every front end (file config,
//! CLI flags, tests) gets the same rules.

mod coordinator_config;
mod error;
mod output_format;

pub use coordinator_config::CoordinatorConfig;
pub use error::ConfigError;
pub use output_format::OutputFormat;
