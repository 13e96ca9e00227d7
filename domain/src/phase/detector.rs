//! Phase detector
//!
//! A heuristic control loop, not a proof-bearing algorithm. Every tick the
//! coordinator feeds one [`TickSample`]; the detector keeps a trailing window
//! and moves the phase forward when the watermarks are crossed:
//!
//! - `Contested → Converging`: agreement rate above the converging watermark
//!   and task completions non-decreasing over the two latest samples
//! - `Converging → Stable`: agreement rate above the stable watermark and
//!   steal attempts per tick at or below the quiet rate
//!
//! At most one transition happens per sample. A window in which nothing was
//! submitted keeps the last agreement rate: a quiet swarm has not disagreed.

use super::state::{PhaseState, PhaseTransition};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Aggregate activity during one coordinator tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSample {
    pub proposals_submitted: u64,
    pub proposals_committed: u64,
    pub tasks_completed: u64,
    pub steal_attempts: u64,
}

/// Tunable detector parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseWatermarks {
    pub converging: f64,
    pub stable: f64,
    /// Mean steal attempts per tick regarded as "near zero"
    pub steal_quiet_rate: f64,
    /// Samples in the trailing window
    pub window_ticks: usize,
}

impl Default for PhaseWatermarks {
    fn default() -> Self {
        Self {
            converging: 0.3,
            stable: 0.7,
            steal_quiet_rate: 0.5,
            window_ticks: 4,
        }
    }
}

/// Detects the Contested → Converging → Stable progression of an epoch
#[derive(Debug, Clone)]
pub struct PhaseDetector {
    watermarks: PhaseWatermarks,
    window: VecDeque<TickSample>,
    state: PhaseState,
    agreement: f64,
}

impl Default for PhaseDetector {
    fn default() -> Self {
        Self::new(PhaseWatermarks::default())
    }
}

impl PhaseDetector {
    pub fn new(watermarks: PhaseWatermarks) -> Self {
        Self {
            window: VecDeque::with_capacity(watermarks.window_ticks.max(2)),
            watermarks,
            state: PhaseState::Contested,
            agreement: 0.0,
        }
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    pub fn watermarks(&self) -> &PhaseWatermarks {
        &self.watermarks
    }

    /// Feed one tick of activity; returns the transition it caused, if any
    pub fn observe(&mut self, sample: TickSample) -> Option<PhaseTransition> {
        if self.window.len() == self.watermarks.window_ticks.max(2) {
            self.window.pop_front();
        }
        self.window.push_back(sample);
        self.update_agreement();

        let to = match self.state {
            PhaseState::Contested
                if self.agreement_rate() > self.watermarks.converging
                    && self.completions_non_decreasing() =>
            {
                PhaseState::Converging
            }
            PhaseState::Converging
                if self.agreement_rate() > self.watermarks.stable
                    && self.steal_rate() <= self.watermarks.steal_quiet_rate =>
            {
                PhaseState::Stable
            }
            _ => return None,
        };

        let transition = PhaseTransition {
            from: self.state,
            to,
        };
        self.state = to;
        Some(transition)
    }

    /// Fraction of proposals submitted in the window that committed
    ///
    /// Clamped to [0, 1]. Starts at 0 and is held while the window contains
    /// no submissions.
    pub fn agreement_rate(&self) -> f64 {
        self.agreement
    }

    fn update_agreement(&mut self) {
        let submitted: u64 = self.window.iter().map(|s| s.proposals_submitted).sum();
        let committed: u64 = self.window.iter().map(|s| s.proposals_committed).sum();
        if submitted > 0 {
            self.agreement = (committed as f64 / submitted as f64).min(1.0);
        }
    }

    /// Mean steal attempts per sample in the window
    pub fn steal_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let attempts: u64 = self.window.iter().map(|s| s.steal_attempts).sum();
        attempts as f64 / self.window.len() as f64
    }

    /// Completions in the latest sample did not drop below the one before
    pub fn completions_non_decreasing(&self) -> bool {
        let mut recent = self.window.iter().rev();
        match (recent.next(), recent.next()) {
            (Some(latest), Some(previous)) => latest.tasks_completed >= previous.tasks_completed,
            _ => false,
        }
    }

    /// Back to `Contested` with an empty window (new epoch)
    pub fn reset(&mut self) {
        self.window.clear();
        self.state = PhaseState::Contested;
        self.agreement = 0.0;
    }
}
