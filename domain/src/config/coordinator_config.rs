//! Coordinator tuning parameters

use super::error::ConfigError;
use crate::phase::PhaseWatermarks;
use crate::quorum::{DEFAULT_QUORUM_THRESHOLD, QuorumGate};
use crate::scheduler::StealPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything the epoch coordinator needs to run
///
/// Built with defaults and `with_*` overrides, then checked once with
/// [`validate`](Self::validate) before the coordinator starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Weighted agreement fraction needed to commit, within [0, 1]
    pub quorum_threshold: f64,
    /// Agreement above which Contested becomes Converging
    pub converging_watermark: f64,
    /// Agreement above which Converging becomes Stable
    pub stable_watermark: f64,
    /// Stable epochs close after this long even with tasks outstanding
    pub max_epoch_duration: Duration,
    pub steal_policy: StealPolicy,
    /// Trailing samples the phase detector looks at
    pub window_ticks: usize,
    /// Mean steal attempts per tick still regarded as quiet
    pub steal_quiet_rate: f64,
    /// Period of the coordinator's tick in the async service
    pub tick_interval: Duration,
    /// Seed for the random steal policy; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let watermarks = PhaseWatermarks::default();
        Self {
            quorum_threshold: DEFAULT_QUORUM_THRESHOLD,
            converging_watermark: watermarks.converging,
            stable_watermark: watermarks.stable,
            max_epoch_duration: Duration::from_secs(5),
            steal_policy: StealPolicy::default(),
            window_ticks: watermarks.window_ticks,
            steal_quiet_rate: watermarks.steal_quiet_rate,
            tick_interval: Duration::from_millis(20),
            seed: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_quorum_threshold(mut self, threshold: f64) -> Self {
        self.quorum_threshold = threshold;
        self
    }

    pub fn with_watermarks(mut self, converging: f64, stable: f64) -> Self {
        self.converging_watermark = converging;
        self.stable_watermark = stable;
        self
    }

    pub fn with_max_epoch_duration(mut self, duration: Duration) -> Self {
        self.max_epoch_duration = duration;
        self
    }

    pub fn with_steal_policy(mut self, policy: StealPolicy) -> Self {
        self.steal_policy = policy;
        self
    }

    pub fn with_window_ticks(mut self, ticks: usize) -> Self {
        self.window_ticks = ticks;
        self
    }

    pub fn with_steal_quiet_rate(mut self, rate: f64) -> Self {
        self.steal_quiet_rate = rate;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject values the coordinator cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("quorum_threshold", self.quorum_threshold)?;
        unit_interval("converging_watermark", self.converging_watermark)?;
        unit_interval("stable_watermark", self.stable_watermark)?;

        if self.converging_watermark >= self.stable_watermark {
            return Err(ConfigError::WatermarksInverted {
                converging: self.converging_watermark,
                stable: self.stable_watermark,
            });
        }
        if self.window_ticks < 2 {
            return Err(ConfigError::WindowTooSmall(self.window_ticks));
        }
        if !self.steal_quiet_rate.is_finite() || self.steal_quiet_rate < 0.0 {
            return Err(ConfigError::InvalidQuietRate(self.steal_quiet_rate));
        }
        if self.max_epoch_duration.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "max_epoch_duration",
            });
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "tick_interval",
            });
        }
        Ok(())
    }

    pub fn watermarks(&self) -> PhaseWatermarks {
        PhaseWatermarks {
            converging: self.converging_watermark,
            stable: self.stable_watermark,
            steal_quiet_rate: self.steal_quiet_rate,
            window_ticks: self.window_ticks,
        }
    }

    pub fn gate(&self) -> Result<QuorumGate, ConfigError> {
        QuorumGate::new(self.quorum_threshold)
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quorum_threshold, 0.62);
        assert_eq!(config.steal_policy, StealPolicy::Busiest);
        assert_eq!(config.max_epoch_duration, Duration::from_secs(5));
        assert_eq!(config.watermarks(), PhaseWatermarks::default());
    }

    #[test]
    fn test_builder() {
        let config = CoordinatorConfig::default()
            .with_quorum_threshold(0.5)
            .with_steal_policy(StealPolicy::Random)
            .with_seed(7)
            .with_tick_interval(Duration::from_millis(5));

        assert_eq!(config.quorum_threshold, 0.5);
        assert_eq!(config.steal_policy, StealPolicy::Random);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.gate().unwrap().threshold(), 0.5);
    }

    #[test]
    fn test_threshold_out_of_range() {
        let err = CoordinatorConfig::default()
            .with_quorum_threshold(1.2)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::OutOfRange {
                field: "quorum_threshold",
                value: 1.2
            }
        );

        let err = CoordinatorConfig::default()
            .with_quorum_threshold(f64::NAN)
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some("quorum_threshold"));
    }

    #[test]
    fn test_threshold_bounds_inclusive() {
        assert!(CoordinatorConfig::default().with_quorum_threshold(0.0).validate().is_ok());
        assert!(CoordinatorConfig::default().with_quorum_threshold(1.0).validate().is_ok());
    }

    #[test]
    fn test_inverted_watermarks() {
        let err = CoordinatorConfig::default()
            .with_watermarks(0.8, 0.4)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::WatermarksInverted { .. }));
    }

    #[test]
    fn test_window_and_durations() {
        assert_eq!(
            CoordinatorConfig::default().with_window_ticks(1).validate(),
            Err(ConfigError::WindowTooSmall(1))
        );
        assert_eq!(
            CoordinatorConfig::default()
                .with_max_epoch_duration(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroDuration {
                field: "max_epoch_duration"
            })
        );
        assert!(matches!(
            CoordinatorConfig::default().with_steal_quiet_rate(-1.0).validate(),
            Err(ConfigError::InvalidQuietRate(_))
        ));
    }
}
