//! Coordinator configuration from TOML (`[coordinator]` section)
//!
//! Example configuration:
//!
//! ```toml
//! [coordinator]
//! quorum_threshold = 0.67
//! converging_watermark = 0.5
//! stable_watermark = 0.8
//! max_epoch_duration_ms = 5000
//! steal_policy = "busiest"     # or "random"
//! window_ticks = 4
//! steal_quiet_rate = 0.5
//! tick_interval_ms = 20
//! seed = 42
//! ```

use liminal_domain::{ConfigError, CoordinatorConfig, StealPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw coordinator tuning from TOML
///
/// Durations are plain milliseconds and the steal policy is a string so a
/// typo surfaces as a [`ConfigError`] instead of a parse failure of the
/// whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCoordinatorConfig {
    pub quorum_threshold: f64,
    pub converging_watermark: f64,
    pub stable_watermark: f64,
    pub max_epoch_duration_ms: u64,
    /// "busiest" or "random"
    pub steal_policy: String,
    pub window_ticks: usize,
    pub steal_quiet_rate: f64,
    pub tick_interval_ms: u64,
    pub seed: Option<u64>,
}

impl Default for FileCoordinatorConfig {
    fn default() -> Self {
        let defaults = CoordinatorConfig::default();
        Self {
            quorum_threshold: defaults.quorum_threshold,
            converging_watermark: defaults.converging_watermark,
            stable_watermark: defaults.stable_watermark,
            max_epoch_duration_ms: defaults.max_epoch_duration.as_millis() as u64,
            steal_policy: defaults.steal_policy.to_string(),
            window_ticks: defaults.window_ticks,
            steal_quiet_rate: defaults.steal_quiet_rate,
            tick_interval_ms: defaults.tick_interval.as_millis() as u64,
            seed: defaults.seed,
        }
    }
}

impl FileCoordinatorConfig {
    pub fn parse_steal_policy(&self) -> Result<StealPolicy, ConfigError> {
        self.steal_policy
            .parse()
            .map_err(|_| ConfigError::UnknownStealPolicy(self.steal_policy.clone()))
    }

    /// Convert into a validated domain configuration
    pub fn to_coordinator_config(&self) -> Result<CoordinatorConfig, ConfigError> {
        let mut config = CoordinatorConfig::default()
            .with_quorum_threshold(self.quorum_threshold)
            .with_watermarks(self.converging_watermark, self.stable_watermark)
            .with_max_epoch_duration(Duration::from_millis(self.max_epoch_duration_ms))
            .with_steal_policy(self.parse_steal_policy()?)
            .with_window_ticks(self.window_ticks)
            .with_steal_quiet_rate(self.steal_quiet_rate)
            .with_tick_interval(Duration::from_millis(self.tick_interval_ms));
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_domain_defaults() {
        let config = FileCoordinatorConfig::default().to_coordinator_config().unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn test_deserialize_coordinator_section() {
        let toml_str = r#"
[coordinator]
quorum_threshold = 0.75
steal_policy = "random"
max_epoch_duration_ms = 1500
seed = 7
"#;
        let file: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let config = file.coordinator.to_coordinator_config().unwrap();

        assert_eq!(config.quorum_threshold, 0.75);
        assert_eq!(config.steal_policy, StealPolicy::Random);
        assert_eq!(config.max_epoch_duration, Duration::from_millis(1500));
        assert_eq!(config.seed, Some(7));
        // untouched keys keep their defaults
        assert_eq!(config.window_ticks, CoordinatorConfig::default().window_ticks);
    }

    #[test]
    fn test_unknown_steal_policy() {
        let config = FileCoordinatorConfig {
            steal_policy: "laziest".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.to_coordinator_config().unwrap_err(),
            ConfigError::UnknownStealPolicy("laziest".to_string())
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = FileCoordinatorConfig {
            quorum_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.to_coordinator_config().is_err());

        let config = FileCoordinatorConfig {
            tick_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.to_coordinator_config(),
            Err(ConfigError::ZeroDuration { .. })
        ));
    }
}
