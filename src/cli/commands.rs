//! Command implementations for the benchvault CLI.
//!
//! Each subcommand has an args struct (wired up in
//! [`super::parser::Commands`]) and a run function. All commands print
//! JSON to stdout; errors surface as `Err` and the caller renders them to
//! stderr.

use crate::eval::ZeroDenominator;
use crate::groundtruth::{load_detections, load_ground_truth};
use crate::regression::RegressionConfig;
use crate::runner::{execute_run, pair_documents, RunSpec};
use crate::store::{BenchmarkStore, SnapshotFilter, StoreConfig};
use crate::types::{MetricKind, SnapshotKey};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Route a parsed command line to its implementation.
pub fn dispatch(cli: super::parser::Cli) -> Result<()> {
    let store_path = cli
        .store
        .unwrap_or_else(BenchmarkStore::default_path);
    match cli.command {
        super::parser::Commands::Run(args) => run(&store_path, args),
        super::parser::Commands::Current(args) => current(&store_path, args),
        super::parser::Commands::History(args) => history(&store_path, args),
        super::parser::Commands::Compare(args) => compare(&store_path, args),
        super::parser::Commands::Checkout(args) => checkout(&store_path, args),
        super::parser::Commands::Diff(args) => diff(&store_path, args),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_since(since: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    since
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::invalid_input(format!("--since '{s}': {e}")))
        })
        .transpose()
}

// =============================================================================
// run
// =============================================================================

/// Arguments for `benchvault run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Model under test
    #[arg(long)]
    pub model_version: String,

    /// Ground-truth dataset identifier
    #[arg(long)]
    pub dataset_version: String,

    /// Prompt revision
    #[arg(long)]
    pub prompt_version: String,

    /// Environment the run executed in
    #[arg(long)]
    pub environment: String,

    /// JSON file of detected issues per document
    #[arg(long, value_name = "FILE")]
    pub detected: PathBuf,

    /// JSON file of expected issues per document
    #[arg(long, value_name = "FILE")]
    pub ground_truth: PathBuf,

    /// Git commit of the harness code
    #[arg(long)]
    pub commit_sha: Option<String>,

    /// External run id; retries with the same id are idempotent
    #[arg(long)]
    pub run_id: Option<String>,

    /// Who or what triggered the run
    #[arg(long, default_value = "cli")]
    pub triggered_by: String,

    /// Free-form label, repeatable
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,

    /// Regression metric (precision, recall, f1)
    #[arg(long, default_value = "f1")]
    pub metric: String,

    /// Regression warning threshold; critical at twice this
    #[arg(long, default_value_t = 0.05)]
    pub threshold: f64,

    /// Zero-denominator reporting policy (zero, undefined)
    #[arg(long, default_value = "zero")]
    pub zero_denominator: String,
}

fn run(store_path: &PathBuf, args: RunArgs) -> Result<()> {
    let metric: MetricKind = args.metric.parse()?;
    let policy = match args.zero_denominator.as_str() {
        "zero" => ZeroDenominator::Zero,
        "undefined" => ZeroDenominator::Undefined,
        other => {
            return Err(Error::invalid_input(format!(
                "--zero-denominator '{other}' (expected zero or undefined)"
            )))
        }
    };

    let store = BenchmarkStore::open_with_config(
        store_path,
        StoreConfig {
            regression: RegressionConfig {
                metric,
                threshold: args.threshold,
            },
            ..StoreConfig::default()
        },
    )?;

    let detections = load_detections(&args.detected)?;
    let ground_truth = load_ground_truth(&args.ground_truth)?;
    let scenarios = pair_documents(detections, ground_truth);

    let outcome = execute_run(
        &store,
        RunSpec {
            model_version: args.model_version,
            dataset_version: args.dataset_version,
            prompt_version: args.prompt_version,
            environment: args.environment,
            commit_sha: args.commit_sha,
            run_id: args.run_id,
            triggered_by: args.triggered_by,
            tags: args.tags.into_iter().collect::<BTreeSet<_>>(),
            notes: args.notes,
        },
        &scenarios,
        policy,
    )?;

    print_json(&outcome)
}

// =============================================================================
// current
// =============================================================================

/// Arguments for `benchvault current`.
#[derive(Args, Debug)]
pub struct CurrentArgs {
    /// Only snapshots of this model
    #[arg(long)]
    pub model_version: Option<String>,

    /// Only snapshots of this dataset
    #[arg(long)]
    pub dataset_version: Option<String>,

    /// Only snapshots in this environment
    #[arg(long)]
    pub environment: Option<String>,
}

fn current(store_path: &PathBuf, args: CurrentArgs) -> Result<()> {
    let store = BenchmarkStore::open(store_path)?;
    let snapshots = store.current_snapshots(&SnapshotFilter {
        model_version: args.model_version,
        dataset_version: args.dataset_version,
        environment: args.environment,
    })?;
    print_json(&snapshots)
}

// =============================================================================
// history
// =============================================================================

/// Arguments for `benchvault history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Model to chart
    #[arg(long)]
    pub model_version: String,

    /// Metric to chart (precision, recall, f1)
    #[arg(long, default_value = "f1")]
    pub metric: String,

    /// Only runs at or after this RFC 3339 instant
    #[arg(long)]
    pub since: Option<String>,
}

fn history(store_path: &PathBuf, args: HistoryArgs) -> Result<()> {
    let store = BenchmarkStore::open(store_path)?;
    let metric: MetricKind = args.metric.parse()?;
    let since = parse_since(args.since.as_deref())?;
    let series = store.time_series(&args.model_version, metric, since)?;
    print_json(&series)
}

// =============================================================================
// compare
// =============================================================================

/// Arguments for `benchvault compare`.
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Model to include, repeatable
    #[arg(short = 'm', long = "model-version", required = true)]
    pub model_versions: Vec<String>,

    /// Only snapshots updated at or after this RFC 3339 instant
    #[arg(long)]
    pub since: Option<String>,
}

fn compare(store_path: &PathBuf, args: CompareArgs) -> Result<()> {
    let store = BenchmarkStore::open(store_path)?;
    let since = parse_since(args.since.as_deref())?;
    let table = store.compare_models(&args.model_versions, since)?;
    print_json(&table)
}

// =============================================================================
// checkout
// =============================================================================

/// Arguments for `benchvault checkout`.
#[derive(Args, Debug)]
#[command(disable_version_flag = true)]
pub struct CheckoutArgs {
    /// Model part of the snapshot key
    #[arg(long)]
    pub model_version: String,

    /// Dataset part of the snapshot key
    #[arg(long)]
    pub dataset_version: String,

    /// Environment part of the snapshot key
    #[arg(long)]
    pub environment: String,

    /// Historical snapshot version to make current again
    #[arg(long)]
    pub version: i64,
}

fn checkout(store_path: &PathBuf, args: CheckoutArgs) -> Result<()> {
    let store = BenchmarkStore::open(store_path)?;
    let key = SnapshotKey::new(args.model_version, args.dataset_version, args.environment);
    let snapshot = store.checkout(&key, args.version)?;
    print_json(&snapshot)
}

// =============================================================================
// diff
// =============================================================================

/// Arguments for `benchvault diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Model part of the snapshot key
    #[arg(long)]
    pub model_version: String,

    /// Dataset part of the snapshot key
    #[arg(long)]
    pub dataset_version: String,

    /// Environment part of the snapshot key
    #[arg(long)]
    pub environment: String,

    /// Older version of the diff
    #[arg(long)]
    pub from: i64,

    /// Newer version of the diff
    #[arg(long)]
    pub to: i64,
}

fn diff(store_path: &PathBuf, args: DiffArgs) -> Result<()> {
    let store = BenchmarkStore::open(store_path)?;
    let key = SnapshotKey::new(args.model_version, args.dataset_version, args.environment);
    let diff = store.snapshot_diff(&key, args.from, args.to)?;
    print_json(&diff)
}
