//! Console output formatter for swarm results

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use liminal_application::SwarmOutcome;
use liminal_domain::Epoch;

/// Formats swarm results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete swarm result
    pub fn format(outcome: &SwarmOutcome) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Liminal Swarm Results"));
        output.push('\n');

        output.push_str(&format!(
            "{} {}\n",
            "Agents:".cyan().bold(),
            Self::agent_list(outcome)
        ));
        output.push_str(&format!(
            "{} {:.2?}\n",
            "Elapsed:".cyan().bold(),
            outcome.elapsed
        ));

        for epoch in &outcome.epochs {
            output.push_str(&Self::section_header(&format!("Epoch {}", epoch.sequence)));
            output.push_str(&Self::epoch_details(epoch));
        }

        output.push_str(&Self::section_header(&format!(
            "Epoch {} (open)",
            outcome.open_epoch.sequence
        )));
        output.push_str(&format!(
            "  phase {}, {} committed so far\n",
            outcome.open_epoch.phase,
            outcome.open_epoch.committed.len()
        ));

        output.push_str(&Self::section_header("Tasks"));
        output.push_str(&Self::totals_line(outcome));
        output.push('\n');

        if !outcome.reached_target {
            output.push_str(&format!(
                "\n{}\n",
                "Time budget ran out before the requested epochs closed"
                    .yellow()
                    .bold()
            ));
        }

        output.push_str(&Self::footer());

        output
    }

    /// Format as JSON
    pub fn format_json(outcome: &SwarmOutcome) -> String {
        serde_json::to_string_pretty(outcome).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format closed epochs only (concise output)
    pub fn format_summary(outcome: &SwarmOutcome) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}\n\n",
            "=== Liminal Summary ===".cyan().bold()
        ));

        for epoch in &outcome.epochs {
            output.push_str(&format!(
                "{} {:>3}  {:>4} committed  {:>3} dropped  {}  {}ms\n",
                "epoch".bold(),
                epoch.sequence,
                epoch.committed.len(),
                epoch.dropped.len(),
                Self::close_reason(epoch),
                epoch.duration().num_milliseconds()
            ));
        }

        output.push_str(&format!(
            "\n{} {} epochs, {} committed, {} dropped across {} agents\n",
            "Total:".dimmed(),
            outcome.epochs.len(),
            outcome.committed(),
            outcome.dropped(),
            outcome.agents.len()
        ));
        output.push_str(&Self::totals_line(outcome));
        output.push('\n');

        output
    }

    fn epoch_details(epoch: &Epoch) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "  closed: {}  ticks: {}  duration: {}ms\n",
            Self::close_reason(epoch),
            epoch.ticks,
            epoch.duration().num_milliseconds()
        ));

        if !epoch.transitions.is_empty() {
            let path: Vec<String> = epoch.transitions.iter().map(|t| t.to.to_string()).collect();
            output.push_str(&format!("  phases: contested -> {}\n", path.join(" -> ")));
        }

        output.push_str(&format!("\n  {}\n", "Committed:".green().bold()));
        if epoch.committed.is_empty() {
            output.push_str("    (none)\n");
        }
        for proposal in &epoch.committed {
            output.push_str(&format!(
                "    {:>6} {:<10} {}\n",
                proposal.id.to_string(),
                proposal.author.to_string(),
                proposal.payload_lossy()
            ));
        }

        if !epoch.dropped.is_empty() {
            let dropped: Vec<String> = epoch.dropped.iter().map(|id| id.to_string()).collect();
            output.push_str(&format!(
                "\n  {} {}\n",
                "Dropped:".yellow().bold(),
                dropped.join(", ")
            ));
        }

        output
    }

    fn agent_list(outcome: &SwarmOutcome) -> String {
        outcome
            .agents
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn close_reason(epoch: &Epoch) -> String {
        epoch
            .close_reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "open".to_string())
    }

    fn totals_line(outcome: &SwarmOutcome) -> String {
        let totals = &outcome.totals;
        format!(
            "tasks: {} pushed, {} done, {} cancelled, {} queued, {} in flight",
            totals.pushed, totals.done, totals.cancelled, totals.queued, totals.in_flight
        )
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, outcome: &SwarmOutcome) -> String {
        Self::format(outcome)
    }

    fn format_json(&self, outcome: &SwarmOutcome) -> String {
        Self::format_json(outcome)
    }

    fn format_summary(&self, outcome: &SwarmOutcome) -> String {
        Self::format_summary(outcome)
    }
}
