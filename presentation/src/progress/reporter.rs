//! Progress reporting for epoch execution

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use liminal_application::EpochObserver;
use liminal_domain::{Epoch, PhaseState, PhaseTransition, Proposal};
use std::sync::Mutex;
use std::time::Duration;

/// Reports epoch progress with one spinner per epoch
pub struct EpochReporter {
    multi: MultiProgress,
    epoch_bar: Mutex<Option<ProgressBar>>,
}

impl EpochReporter {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            epoch_bar: Mutex::new(None),
        }
    }

    fn epoch_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {pos} committed  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn phase_label(phase: PhaseState) -> String {
        match phase {
            PhaseState::Contested => phase.display_name().red().to_string(),
            PhaseState::Converging => phase.display_name().yellow().to_string(),
            PhaseState::Stable => phase.display_name().green().to_string(),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.epoch_bar.lock()
            && let Some(pb) = guard.as_ref()
        {
            f(pb);
        }
    }

    /// Commits shown on the current epoch's spinner
    pub fn position(&self) -> Option<u64> {
        self.epoch_bar
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(ProgressBar::position))
    }
}

impl Default for EpochReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochObserver for EpochReporter {
    fn on_epoch_open(&self, epoch: &Epoch) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::epoch_style());
        pb.set_prefix(format!("Epoch {}", epoch.sequence));
        pb.set_message(Self::phase_label(epoch.phase));
        pb.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut guard) = self.epoch_bar.lock() {
            *guard = Some(pb);
        }
    }

    fn on_commit(&self, _epoch: u64, proposal: &Proposal) {
        self.with_bar(|pb| {
            pb.inc(1);
            pb.set_message(format!("{} {}", "+".green(), proposal.author));
        });
    }

    fn on_phase_change(&self, _epoch: u64, transition: &PhaseTransition) {
        self.with_bar(|pb| pb.set_message(Self::phase_label(transition.to)));
    }

    fn on_epoch_close(&self, epoch: &Epoch) {
        let taken = self.epoch_bar.lock().ok().and_then(|mut guard| guard.take());
        if let Some(pb) = taken {
            let reason = epoch
                .close_reason
                .map(|r| r.to_string())
                .unwrap_or_default();
            pb.finish_with_message(format!(
                "{} ({}, {} dropped)",
                "closed".green(),
                reason,
                epoch.dropped.len()
            ));
        }
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleReporter;

impl EpochObserver for SimpleReporter {
    fn on_epoch_open(&self, epoch: &Epoch) {
        println!("{} {}", "->".cyan(), format!("Epoch {}", epoch.sequence).bold());
    }

    fn on_commit(&self, _epoch: u64, proposal: &Proposal) {
        println!(
            "  {} {} from {}",
            "v".green(),
            proposal.id,
            proposal.author
        );
    }

    fn on_phase_change(&self, _epoch: u64, transition: &PhaseTransition) {
        println!(
            "  {} {}",
            "~".yellow(),
            EpochReporter::phase_label(transition.to)
        );
    }

    fn on_epoch_close(&self, epoch: &Epoch) {
        let reason = epoch
            .close_reason
            .map(|r| r.to_string())
            .unwrap_or_default();
        println!(
            "  {} closed: {} committed, {} dropped ({})",
            "x".dimmed(),
            epoch.committed.len(),
            epoch.dropped.len(),
            reason
        );
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use liminal_domain::{AgentId, CloseReason, ProposalId, VectorClock};

    fn proposal(author: &str, seq: u64) -> Proposal {
        Proposal {
            id: ProposalId::new(seq),
            author: AgentId::new(author),
            payload: b"p".to_vec(),
            clock: VectorClock::new(),
            submitted_epoch: 1,
            submitted_seq: seq,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_reporter_counts_commits_per_epoch() {
        let reporter = EpochReporter::with_draw_target(ProgressDrawTarget::hidden());
        let mut epoch = Epoch::open(1, VectorClock::new());

        reporter.on_epoch_open(&epoch);
        assert_eq!(reporter.position(), Some(0));

        reporter.on_commit(1, &proposal("a", 1));
        reporter.on_commit(1, &proposal("b", 2));
        reporter.on_phase_change(
            1,
            &PhaseTransition {
                from: PhaseState::Contested,
                to: PhaseState::Converging,
            },
        );
        assert_eq!(reporter.position(), Some(2));

        epoch.seal(VectorClock::new(), Vec::new(), CloseReason::BacklogDrained);
        reporter.on_epoch_close(&epoch);
        assert_eq!(reporter.position(), None);
    }

    #[test]
    fn test_callbacks_without_open_epoch_are_ignored() {
        let reporter = EpochReporter::with_draw_target(ProgressDrawTarget::hidden());
        reporter.on_commit(3, &proposal("a", 1));
        reporter.on_epoch_close(&Epoch::open(3, VectorClock::new()));
        assert_eq!(reporter.position(), None);
    }
}
