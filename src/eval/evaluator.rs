//! Issue matching and metric computation.
//!
//! The evaluator turns a list of detected issues and a list of expected
//! issues into true/false positive/negative counts and precision, recall,
//! and F1. Matching is multiset consumption over canonical issue types:
//! each detectable expected issue opens one slot keyed by its canonical
//! type, and each detected issue either consumes a remaining slot of its
//! type (a true positive) or counts as a false positive. Slots left over
//! at the end are false negatives.
//!
//! The final counts are independent of the order of `detected`: a
//! permutation only changes *which* duplicate consumes a slot, never how
//! many do. Pure, no side effects; empty inputs are a valid zero-metric
//! result, not an error.

use crate::eval::canonical_type;
use crate::types::{
    EvaluationResult, ExpectedIssue, Issue, ScenarioResult, Severity, SeverityCounts,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

// =============================================================================
// Reporting policy
// =============================================================================

/// How a zero-denominator metric is reported.
///
/// Stored results always use [`Zero`](ZeroDenominator::Zero) so snapshots
/// stay total and comparable across runs. Dashboards that would rather
/// exclude "no detections, no expectations" scenarios from averages can ask
/// for the [`Undefined`](ZeroDenominator::Undefined) view instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroDenominator {
    /// A metric with a zero denominator is `0.0`.
    #[default]
    Zero,
    /// A metric with a zero denominator is absent.
    Undefined,
}

/// Metrics rendered under a [`ZeroDenominator`] policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsView {
    /// Precision, absent when nothing was detected under `Undefined`.
    pub precision: Option<f64>,
    /// Recall, absent when nothing was expected under `Undefined`.
    pub recall: Option<f64>,
    /// F1, absent when both components are absent under `Undefined`.
    pub f1: Option<f64>,
}

/// Render a result's metrics under the given policy.
#[must_use]
pub fn metrics_view(result: &EvaluationResult, policy: ZeroDenominator) -> MetricsView {
    match policy {
        ZeroDenominator::Zero => MetricsView {
            precision: Some(result.precision),
            recall: Some(result.recall),
            f1: Some(result.f1),
        },
        ZeroDenominator::Undefined => {
            let detected = result.true_positives + result.false_positives;
            let expected = result.true_positives + result.false_negatives;
            let precision = (detected > 0).then_some(result.precision);
            let recall = (expected > 0).then_some(result.recall);
            let f1 = (precision.is_some() || recall.is_some()).then_some(result.f1);
            MetricsView {
                precision,
                recall,
                f1,
            }
        }
    }
}

// =============================================================================
// Matching
// =============================================================================

/// Expected-issue slots keyed by canonical type, consumed in ground-truth
/// input order.
struct SlotTable {
    slots: HashMap<String, VecDeque<Severity>>,
}

impl SlotTable {
    fn build(expected: &[ExpectedIssue], warnings: &mut Vec<String>) -> Self {
        let mut slots: HashMap<String, VecDeque<Severity>> = HashMap::new();
        for (idx, e) in expected.iter().enumerate() {
            if !e.should_detect {
                continue;
            }
            let canon = canonical_type(&e.issue.issue_type);
            if canon.is_empty() {
                warnings.push(format!(
                    "skipped expected issue #{idx}: type '{}' has no canonical form",
                    e.issue.issue_type
                ));
                continue;
            }
            slots.entry(canon).or_default().push_back(e.issue.severity);
        }
        Self { slots }
    }

    /// Consume one slot for the canonical type, returning the severity of
    /// the expected issue that filled it.
    fn consume(&mut self, canon: &str) -> Option<Severity> {
        self.slots.get_mut(canon).and_then(VecDeque::pop_front)
    }

    /// Severities of all remaining (unmatched) slots.
    fn remaining(self) -> impl Iterator<Item = Severity> {
        self.slots.into_values().flatten()
    }
}

/// Evaluate detected issues against expected issues.
///
/// Implements the matching algorithm described at module level. Expected
/// issues with `should_detect = false` never open slots and therefore never
/// contribute false negatives. Issues whose type canonicalizes to the empty
/// string are skipped entirely (counted as neither TP, FP, nor FN); callers
/// needing the skip reasons should use [`evaluate_scenario`].
#[must_use]
pub fn evaluate(detected: &[Issue], expected: &[ExpectedIssue]) -> EvaluationResult {
    evaluate_scenario("", detected, expected).metrics
}

/// Evaluate one scenario, keeping per-severity counts, savings totals, and
/// skip warnings alongside the headline metrics.
#[must_use]
pub fn evaluate_scenario(
    scenario_id: impl Into<String>,
    detected: &[Issue],
    expected: &[ExpectedIssue],
) -> ScenarioResult {
    let mut warnings = Vec::new();
    let mut slots = SlotTable::build(expected, &mut warnings);
    let mut per_severity: BTreeMap<Severity, SeverityCounts> = BTreeMap::new();

    let mut true_positives = 0u64;
    let mut false_positives = 0u64;

    for (idx, d) in detected.iter().enumerate() {
        let canon = canonical_type(&d.issue_type);
        if canon.is_empty() {
            warnings.push(format!(
                "skipped detected issue #{idx}: type '{}' has no canonical form",
                d.issue_type
            ));
            continue;
        }
        match slots.consume(&canon) {
            Some(expected_severity) => {
                true_positives += 1;
                per_severity
                    .entry(expected_severity)
                    .or_default()
                    .true_positives += 1;
            }
            None => {
                false_positives += 1;
                per_severity.entry(d.severity).or_default().false_positives += 1;
            }
        }
    }

    let mut false_negatives = 0u64;
    for severity in slots.remaining() {
        false_negatives += 1;
        per_severity.entry(severity).or_default().false_negatives += 1;
    }

    let expected_savings = expected
        .iter()
        .filter(|e| e.should_detect)
        .filter_map(|e| e.issue.savings)
        .sum();
    let detected_savings = detected.iter().filter_map(|d| d.savings).sum();

    ScenarioResult {
        scenario_id: scenario_id.into(),
        metrics: EvaluationResult::from_counts(true_positives, false_positives, false_negatives),
        per_severity,
        expected_savings,
        detected_savings,
        warnings,
    }
}

/// Aggregate per-scenario results into run-level metrics.
///
/// Sums TP/FP/FN across scenarios and recomputes precision/recall/F1 from
/// the totals. Never averages per-scenario F1 scores: with small
/// per-scenario counts that average is statistically misleading.
#[must_use]
pub fn aggregate_scenarios(scenarios: &[ScenarioResult]) -> EvaluationResult {
    let mut tp = 0u64;
    let mut fp = 0u64;
    let mut fn_ = 0u64;
    for s in scenarios {
        tp += s.metrics.true_positives;
        fp += s.metrics.false_positives;
        fn_ += s.metrics.false_negatives;
    }
    EvaluationResult::from_counts(tp, fp, fn_)
}
