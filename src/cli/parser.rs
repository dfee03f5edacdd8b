//! CLI argument parsing and structure definitions.

use super::commands::{
    CheckoutArgs, CompareArgs, CurrentArgs, DiffArgs, HistoryArgs, RunArgs,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Benchmark evaluation and versioned snapshot tracking.
#[derive(Parser)]
#[command(name = "benchvault")]
#[command(
    author,
    version,
    about = "Benchmark evaluation and versioned snapshot tracking for AI issue detectors",
    long_about = r#"
benchvault - evaluate detector output against ground truth and track how
metrics evolve across runs, models, and code versions.

Every run is recorded immutably in a transaction log; a versioned snapshot
store keeps exactly one "current" metrics row per (model, dataset,
environment) key. Regressions against the previous current snapshot raise
alerts, and any historical version can be checked out as the new current
state without rewriting history.

EXAMPLES:
  benchvault run --model-version gpt-4o --dataset-version bills-v3 \
      --prompt-version p7 --environment ci \
      --detected detected.json --ground-truth gt.json --run-id ci-1234
  benchvault current --environment ci
  benchvault history --model-version gpt-4o --metric f1
  benchvault compare -m gpt-4o -m gemini-1.5-pro
  benchvault checkout --model-version gpt-4o --dataset-version bills-v3 \
      --environment ci --version 3
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the store database (default: $BENCHVAULT_STORE or
    /// .benchvault.sqlite3)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Selected subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a run against ground truth and record it
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Show current snapshots
    #[command(visible_alias = "cur")]
    Current(CurrentArgs),

    /// Time series of a metric for one model
    #[command(visible_alias = "h")]
    History(HistoryArgs),

    /// Side-by-side latest metrics for several models
    #[command(visible_alias = "cmp")]
    Compare(CompareArgs),

    /// Make a historical snapshot version current again
    Checkout(CheckoutArgs),

    /// Metric deltas between two snapshot versions
    Diff(DiffArgs),
}
