//! Output formatter trait

use liminal_application::SwarmOutcome;
use liminal_domain::OutputFormat;

/// Trait for formatting swarm results
pub trait OutputFormatter {
    /// Every epoch with its commits, transitions and drops
    fn format(&self, outcome: &SwarmOutcome) -> String;

    /// Format as JSON
    fn format_json(&self, outcome: &SwarmOutcome) -> String;

    /// One line per epoch plus totals
    fn format_summary(&self, outcome: &SwarmOutcome) -> String;

    fn render(&self, format: OutputFormat, outcome: &SwarmOutcome) -> String {
        match format {
            OutputFormat::Full => self.format(outcome),
            OutputFormat::Json => self.format_json(outcome),
            OutputFormat::Summary => self.format_summary(outcome),
        }
    }
}
