//! # benchvault
//!
//! Benchmark evaluation and versioned snapshot tracking for AI issue
//! detectors.
//!
//! benchvault continuously evaluates model output against hand-authored
//! ground truth and durably tracks how metrics evolve across runs, models,
//! and code versions:
//!
//! - **Evaluation**: detected findings are matched against expected
//!   findings on canonicalized issue types, producing TP/FP/FN and
//!   precision/recall/F1 per scenario and per run.
//! - **Persistence**: every run is appended immutably to a transaction
//!   log; a snapshot store keeps exactly one "current" metrics row per
//!   (model, dataset, environment) key, with strictly increasing version
//!   numbers and full history for audit.
//! - **Regression detection**: each write compares against the previous
//!   current snapshot and embeds warning/critical alerts in the run record.
//! - **Time travel**: any historical snapshot version can be checked out
//!   as the new current state; history is never mutated or deleted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use benchvault::eval::evaluate;
//! use benchvault::store::BenchmarkStore;
//! use benchvault::{ExpectedIssue, Issue, Severity};
//!
//! let detected = vec![Issue::new("Duplicate Charge", Severity::High)];
//! let expected = vec![ExpectedIssue::detectable(Issue::new(
//!     "duplicate_charge",
//!     Severity::High,
//! ))];
//!
//! let result = evaluate(&detected, &expected);
//! assert_eq!(result.f1, 1.0);
//!
//! let store = BenchmarkStore::open(".benchvault.sqlite3")?;
//! # let _ = store;
//! # Ok::<(), benchvault::Error>(())
//! ```
//!
//! ## Guarantees
//!
//! | Invariant | Enforced by |
//! |-----------|-------------|
//! | One current row per key | partial unique index + atomic flip |
//! | Versions gapless, never reused | per-key lock around version bump |
//! | Transaction log append-only | single write path, no update/delete |
//! | Idempotent run submission | unique (run_id, model_version) index |
//! | Regression check never blocks a write | errors logged, alert dropped |
//!
//! ## Design Philosophy
//!
//! - **Evaluation is pure**: the matcher has no side effects and runs
//!   entirely outside the store's locks.
//! - **History is sacred**: rollback is a new, auditable event pointing at
//!   old data, never a mutation of it.
//! - **Metrics are total**: zero denominators yield `0.0`, not NaN, so
//!   aggregation never has holes (an "undefined" reporting view is
//!   available for dashboards that prefer gaps).

#![warn(missing_docs)]

pub mod cli;
mod error;
pub mod eval;
pub mod groundtruth;
pub mod regression;
pub mod runner;
pub mod store;
mod types;

pub use error::{Error, Result};
pub use types::{
    AlertSeverity, EvaluationResult, ExpectedIssue, Issue, MetricKind, NewRun, RegressionAlert,
    ScenarioResult, Severity, SeverityCounts, Snapshot, SnapshotKey, Transaction,
};
