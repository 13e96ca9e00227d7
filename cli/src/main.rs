//! CLI entrypoint for liminal
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use liminal_application::{EpochJournal, EpochObserver, NoJournal, NoObserver, RunSwarmUseCase};
use liminal_domain::OutputFormat;
use liminal_infrastructure::{ConfigLoader, FileConfig, JsonlEpochJournal};
use liminal_presentation::{
    Cli, ConsoleFormatter, EpochReporter, OutputFormatter, SimpleReporter,
};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(());
    }

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = init_tracing(&cli);

    info!("Starting liminal");

    // Load configuration
    let mut file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("Failed to load configuration")?
    };
    apply_overrides(&cli, &mut file_config);

    if !file_config.output.color {
        colored::control::set_override(false);
    }

    let config = file_config.coordinator.to_coordinator_config()?;
    let mut input = file_config.swarm.to_input();
    if let Some(seed) = config.seed {
        input = input.with_seed(seed);
    }
    let format = file_config.output.format.unwrap_or_default();

    // === Dependency Injection ===
    let journal: Arc<dyn EpochJournal> = match file_config.journal.resolve_path() {
        Some(path) => match JsonlEpochJournal::new(&path) {
            Some(journal) => {
                info!("Writing epoch journal to {}", journal.path().display());
                Arc::new(journal)
            }
            None => bail!("Could not open epoch journal at {}", path.display()),
        },
        None => Arc::new(NoJournal),
    };

    // JSON goes to stdout untouched, so progress stays out of the way
    let observer: Arc<dyn EpochObserver> = if cli.quiet || format == OutputFormat::Json {
        Arc::new(NoObserver)
    } else if std::io::stderr().is_terminal() {
        Arc::new(EpochReporter::new())
    } else {
        Arc::new(SimpleReporter)
    };

    if !cli.quiet && format != OutputFormat::Json {
        println!();
        println!("+============================================================+");
        println!("|           Liminal - Turn/Epoch Coordinator                 |");
        println!("+============================================================+");
        println!();
        println!(
            "Agents: {}  Epochs: {}  Threshold: {}  Steal policy: {}",
            input.agents, input.epochs, config.quorum_threshold, config.steal_policy
        );
        println!();
    }

    let use_case = RunSwarmUseCase::new(config)
        .with_observer(observer)
        .with_journal(journal);
    let outcome = use_case.execute(input).await?;

    // Output results
    println!("{}", ConsoleFormatter.render(format, &outcome));

    if !outcome.reached_target {
        bail!(
            "Only {} epoch(s) closed within the time budget",
            outcome.epochs.len()
        );
    }

    Ok(())
}

/// Console logging from `RUST_LOG` or `-v`, plus an optional rolling file
fn init_tracing(cli: &Cli) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    });

    let (file_layer, guard) = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "liminal.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    guard
}

/// CLI flags win over every configuration source
fn apply_overrides(cli: &Cli, config: &mut FileConfig) {
    if let Some(agents) = cli.agents {
        config.swarm.agents = agents;
    }
    if let Some(epochs) = cli.epochs {
        config.swarm.epochs = epochs;
    }
    if let Some(rate) = cli.approval_rate {
        config.swarm.approval_rate = rate;
    }
    if let Some(secs) = cli.time_budget {
        config.swarm.time_budget_ms = Duration::from_secs(secs).as_millis() as u64;
    }
    if let Some(threshold) = cli.threshold {
        config.coordinator.quorum_threshold = threshold;
    }
    if let Some(policy) = cli.steal_policy {
        config.coordinator.steal_policy = policy.to_string();
    }
    if let Some(seed) = cli.seed {
        config.coordinator.seed = Some(seed);
    }
    if let Some(format) = cli.output {
        config.output.format = Some(format);
    }
    if let Some(path) = &cli.journal {
        config.journal.enabled = true;
        if path.is_some() {
            config.journal.path = path.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liminal_domain::StealPolicy;

    #[test]
    fn test_cli_overrides_file_values() {
        let cli = Cli::try_parse_from([
            "liminal",
            "--agents",
            "7",
            "--threshold",
            "0.8",
            "--steal-policy",
            "random",
            "--journal",
            "run.jsonl",
        ])
        .unwrap();
        let mut config = FileConfig::default();
        config.swarm.epochs = 9;

        apply_overrides(&cli, &mut config);

        assert_eq!(config.swarm.agents, 7);
        assert_eq!(config.swarm.epochs, 9);
        assert_eq!(config.coordinator.quorum_threshold, 0.8);
        assert_eq!(
            config.coordinator.parse_steal_policy().unwrap(),
            StealPolicy::Random
        );
        assert!(config.journal.enabled);
        assert_eq!(
            config.journal.path.as_deref(),
            Some(std::path::Path::new("run.jsonl"))
        );
    }

    #[test]
    fn test_bare_journal_flag_keeps_configured_path() {
        let cli = Cli::try_parse_from(["liminal", "--journal"]).unwrap();
        let mut config = FileConfig::default();
        config.journal.path = Some("configured.jsonl".into());

        apply_overrides(&cli, &mut config);

        assert!(config.journal.enabled);
        assert_eq!(
            config.journal.path.as_deref(),
            Some(std::path::Path::new("configured.jsonl"))
        );
    }
}
