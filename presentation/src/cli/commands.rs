//! CLI command definitions

use clap::Parser;
use liminal_domain::{OutputFormat, StealPolicy};
use std::path::PathBuf;

/// CLI arguments for liminal
#[derive(Parser, Debug)]
#[command(name = "liminal")]
#[command(author, version, about = "Turn/epoch coordinator for agent swarms")]
#[command(long_about = r#"
Liminal runs a swarm of simulated agents against the epoch coordinator.

Each epoch goes through three phases:
1. Contested: agents propose and vote, quorum decides what commits
2. Converging: agreement rises past the converging watermark
3. Stable: agreement is high and nobody is stealing work

A stable epoch closes once its task backlog drains (or its time runs out)
and the next one opens.

Configuration files are loaded from (in priority order):
1. LIMINAL_* environment variables
2. --config <path>     Explicit config file
3. ./liminal.toml      Project-level config
4. ~/.config/liminal/config.toml   Global config

Example:
  liminal --agents 8 --epochs 5
  liminal --threshold 0.75 --steal-policy random --seed 42 --output full
  liminal --journal runs/epochs.jsonl --output json
"#)]
pub struct Cli {
    /// Number of simulated agents
    #[arg(short, long, value_name = "N")]
    pub agents: Option<usize>,

    /// Epochs to close before stopping
    #[arg(short, long, value_name = "N")]
    pub epochs: Option<usize>,

    /// Weighted agreement fraction needed to commit a proposal
    #[arg(short, long, value_name = "FRACTION")]
    pub threshold: Option<f64>,

    /// Victim selection for work stealing (busiest, random)
    #[arg(long, value_name = "POLICY")]
    pub steal_policy: Option<StealPolicy>,

    /// Probability an agent approves a peer's proposal
    #[arg(long, value_name = "RATE")]
    pub approval_rate: Option<f64>,

    /// Seed for the steal policy and the simulated agents
    #[arg(long)]
    pub seed: Option<u64>,

    /// Wall-clock budget for the run, in seconds
    #[arg(long, value_name = "SECS")]
    pub time_budget: Option<u64>,

    /// Output format (summary, full, json)
    #[arg(short, long, value_name = "FORMAT")]
    pub output: Option<OutputFormat>,

    /// Write the JSONL epoch journal (optionally to PATH)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub journal: Option<Option<PathBuf>>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
