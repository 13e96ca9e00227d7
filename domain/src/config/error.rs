//! Configuration validation errors

use thiserror::Error;

/// A configuration value the coordinator cannot run with
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("converging watermark ({converging}) must be below the stable watermark ({stable})")]
    WatermarksInverted { converging: f64, stable: f64 },

    #[error("window_ticks must be at least 2, got {0}")]
    WindowTooSmall(usize),

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("steal_quiet_rate must be a finite non-negative number, got {0}")]
    InvalidQuietRate(f64),

    #[error("{0}")]
    UnknownStealPolicy(String),
}

impl ConfigError {
    /// Name of the offending field, when one applies
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::OutOfRange { field, .. } | ConfigError::ZeroDuration { field } => {
                Some(*field)
            }
            ConfigError::WatermarksInverted { .. } => Some("converging_watermark"),
            ConfigError::WindowTooSmall(_) => Some("window_ticks"),
            ConfigError::InvalidQuietRate(_) => Some("steal_quiet_rate"),
            ConfigError::UnknownStealPolicy(_) => Some("steal_policy"),
        }
    }
}
