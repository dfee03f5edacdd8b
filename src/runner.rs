//! The evaluate-and-persist pipeline.
//!
//! Wires the evaluator and the store together the way the CLI and CI use
//! them: pair detection records with ground truth, evaluate every
//! scenario, aggregate to run-level metrics, upsert, and report the
//! outcome as one JSON-serializable value. Evaluation runs entirely
//! before the store's per-key lock is taken.

use crate::eval::{aggregate_scenarios, evaluate_scenario, metrics_view, MetricsView, ZeroDenominator};
use crate::groundtruth::{DetectedDocument, GroundTruthDocument};
use crate::store::BenchmarkStore;
use crate::types::{
    EvaluationResult, ExpectedIssue, Issue, NewRun, RegressionAlert, ScenarioResult,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Identity of a benchmark run, minus the evaluated content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    /// Model under test.
    pub model_version: String,
    /// Ground-truth dataset identifier.
    pub dataset_version: String,
    /// Prompt revision.
    pub prompt_version: String,
    /// Environment the run executed in.
    pub environment: String,
    /// Git commit of the harness code, when known.
    pub commit_sha: Option<String>,
    /// External run id (idempotency token).
    pub run_id: Option<String>,
    /// Who or what triggered the run.
    pub triggered_by: String,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// One scenario ready for evaluation.
#[derive(Debug, Clone)]
pub struct ScenarioInput {
    /// Scenario identifier, typically the document id.
    pub scenario_id: String,
    /// Issues the model reported for this document.
    pub detected: Vec<Issue>,
    /// Ground truth for this document.
    pub expected: Vec<ExpectedIssue>,
}

/// Structured result of a run, printed to stdout by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Run-level metrics (summed counts across scenarios).
    pub metrics: EvaluationResult,
    /// The same metrics rendered under the requested
    /// zero-denominator policy.
    pub metrics_view: MetricsView,
    /// Version of the snapshot now current for the run's key.
    pub snapshot_version: i64,
    /// Id of the transaction recording the run.
    pub transaction_id: Uuid,
    /// False when this was an idempotent resubmission.
    pub created: bool,
    /// Regression alerts raised by this write.
    pub alerts: Vec<RegressionAlert>,
    /// Number of scenarios evaluated.
    pub scenario_count: usize,
    /// Total evaluator warnings across scenarios (skipped records etc.).
    pub warning_count: usize,
}

/// Pair detection records with ground-truth records by document id.
///
/// Ground-truth order drives scenario order. A ground-truth document with
/// no detection record evaluates against an empty detection list (the
/// model found nothing there; every detectable expectation becomes a
/// false negative). A detection record with no ground-truth document is
/// kept as an all-false-positive scenario: ground truth is the
/// denominator of record, so detections outside it are flagged rather
/// than silently dropped.
pub fn pair_documents(
    detections: Vec<DetectedDocument>,
    ground_truth: Vec<GroundTruthDocument>,
) -> Vec<ScenarioInput> {
    let mut detected_by_id: std::collections::HashMap<String, Vec<Issue>> = detections
        .into_iter()
        .map(|d| (d.document_id, d.detected_issues))
        .collect();

    let mut scenarios = Vec::with_capacity(ground_truth.len());
    for doc in ground_truth {
        let detected = detected_by_id.remove(&doc.document_id).unwrap_or_default();
        scenarios.push(ScenarioInput {
            scenario_id: doc.document_id,
            detected,
            expected: doc
                .expected_issues
                .into_iter()
                .map(|i| i.into_expected())
                .collect(),
        });
    }

    let mut orphans: Vec<_> = detected_by_id.into_iter().collect();
    orphans.sort_by(|a, b| a.0.cmp(&b.0));
    for (document_id, detected) in orphans {
        log::warn!("detections for '{document_id}' have no ground-truth record");
        scenarios.push(ScenarioInput {
            scenario_id: document_id,
            detected,
            expected: Vec::new(),
        });
    }

    scenarios
}

/// Evaluate every scenario and persist the run.
pub fn execute_run(
    store: &BenchmarkStore,
    spec: RunSpec,
    scenarios: &[ScenarioInput],
    policy: ZeroDenominator,
) -> Result<RunOutcome> {
    let scenario_results: Vec<ScenarioResult> = scenarios
        .iter()
        .map(|s| evaluate_scenario(s.scenario_id.clone(), &s.detected, &s.expected))
        .collect();
    let metrics = aggregate_scenarios(&scenario_results);
    let warning_count = scenario_results.iter().map(|s| s.warnings.len()).sum();
    let scenario_count = scenario_results.len();

    let outcome = store.upsert(NewRun {
        model_version: spec.model_version,
        dataset_version: spec.dataset_version,
        prompt_version: spec.prompt_version,
        environment: spec.environment,
        metrics,
        scenario_results,
        commit_sha: spec.commit_sha,
        run_id: spec.run_id,
        triggered_by: spec.triggered_by,
        tags: spec.tags,
        notes: spec.notes,
    })?;

    Ok(RunOutcome {
        metrics,
        metrics_view: metrics_view(&metrics, policy),
        snapshot_version: outcome.snapshot.snapshot_version,
        transaction_id: outcome.transaction_id,
        created: outcome.created,
        alerts: outcome.alerts,
        scenario_count,
        warning_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groundtruth::GroundTruthIssue;
    use crate::types::Severity;

    fn gt_doc(id: &str, types: &[&str]) -> GroundTruthDocument {
        GroundTruthDocument {
            document_id: id.into(),
            expected_issues: types
                .iter()
                .map(|t| GroundTruthIssue {
                    issue_type: (*t).into(),
                    cpt_code: None,
                    severity: Severity::High,
                    should_detect: true,
                    expected_savings: None,
                })
                .collect(),
        }
    }

    fn det_doc(id: &str, types: &[&str]) -> DetectedDocument {
        DetectedDocument {
            document_id: id.into(),
            detected_issues: types
                .iter()
                .map(|t| Issue::new(*t, Severity::High))
                .collect(),
        }
    }

    #[test]
    fn pairing_follows_ground_truth_order() {
        let scenarios = pair_documents(
            vec![det_doc("b", &["x"]), det_doc("a", &["y"])],
            vec![gt_doc("a", &["y"]), gt_doc("b", &["x"])],
        );
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].scenario_id, "a");
        assert_eq!(scenarios[1].scenario_id, "b");
    }

    #[test]
    fn missing_detections_evaluate_as_empty() {
        let scenarios = pair_documents(vec![], vec![gt_doc("a", &["duplicate_charge"])]);
        assert_eq!(scenarios.len(), 1);
        assert!(scenarios[0].detected.is_empty());
        assert_eq!(scenarios[0].expected.len(), 1);
    }

    #[test]
    fn orphan_detections_become_fp_scenarios() {
        let scenarios = pair_documents(vec![det_doc("ghost", &["duplicate_charge"])], vec![]);
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].scenario_id, "ghost");
        assert!(scenarios[0].expected.is_empty());

        let result = evaluate_scenario(
            scenarios[0].scenario_id.clone(),
            &scenarios[0].detected,
            &scenarios[0].expected,
        );
        assert_eq!(result.metrics.false_positives, 1);
    }
}
