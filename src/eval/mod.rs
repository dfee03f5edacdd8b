//! Benchmark evaluation: issue matching and metric computation.
//!
//! # Overview
//!
//! This module turns detector output into comparable metrics:
//!
//! - [`canonical_type`] canonicalizes issue type strings so matching is
//!   robust to casing, punctuation, and naming-convention differences.
//! - [`evaluate`] / [`evaluate_scenario`] match detected issues against
//!   ground truth and compute TP/FP/FN with precision, recall, and F1.
//! - [`aggregate_scenarios`] rolls per-scenario counts up into run-level
//!   metrics.
//!
//! # Example
//!
//! ```rust
//! use benchvault::eval::evaluate;
//! use benchvault::{ExpectedIssue, Issue, Severity};
//!
//! let detected = vec![Issue::new("Duplicate Charge", Severity::High)];
//! let expected = vec![ExpectedIssue::detectable(Issue::new(
//!     "duplicate_charge",
//!     Severity::High,
//! ))];
//!
//! let result = evaluate(&detected, &expected);
//! assert_eq!(result.true_positives, 1);
//! assert_eq!(result.f1, 1.0);
//! ```
//!
//! Matching is type-only by design: descriptions, amounts, and dates vary
//! too much between detectors to be a reliable equality key. The cost is
//! that two genuinely different issues sharing a type can collide into one
//! match slot; the at-most-one-consumption rule bounds the damage.

mod evaluator;
mod normalize;

pub use evaluator::{
    aggregate_scenarios, evaluate, evaluate_scenario, metrics_view, MetricsView, ZeroDenominator,
};
pub use normalize::{canonical_type, types_match};
