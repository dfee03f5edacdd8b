//! Core data model: issues, evaluation results, transactions, snapshots.
//!
//! Everything here is plain data with serde derives. The evaluator
//! (`crate::eval`) produces [`EvaluationResult`]s and [`ScenarioResult`]s;
//! the store (`crate::store`) persists them as [`Transaction`]s and
//! [`Snapshot`]s; the regression detector emits [`RegressionAlert`]s that
//! are embedded in the transaction that triggered them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Issues
// =============================================================================

/// Severity of a billing issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Minor finding, informational.
    Low,
    /// Worth reviewing, limited financial impact.
    Medium,
    /// Significant overcharge or coding problem.
    High,
    /// Clear error with major financial impact.
    Critical,
}

impl Severity {
    /// Stable string form, used for SQL columns and display.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding, either detected by a model or expected by ground truth.
///
/// Two issues are considered the same finding when their canonicalized
/// `issue_type` strings are equal (see [`crate::eval::canonical_type`]).
/// Matching is intentionally type-only: free-text descriptions and amounts
/// vary too much between detectors to serve as an equality key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue type label, e.g. `"Duplicate Charge"` or `"duplicate_charge"`.
    #[serde(rename = "type")]
    pub issue_type: String,
    /// CPT code of the affected line item, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpt_code: Option<String>,
    /// Severity of the finding.
    pub severity: Severity,
    /// Estimated recoverable amount in dollars, when estimated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings: Option<f64>,
}

impl Issue {
    /// Create an issue with just a type and severity.
    pub fn new(issue_type: impl Into<String>, severity: Severity) -> Self {
        Self {
            issue_type: issue_type.into(),
            cpt_code: None,
            severity,
            savings: None,
        }
    }

    /// Attach a CPT code.
    pub fn with_cpt_code(mut self, code: impl Into<String>) -> Self {
        self.cpt_code = Some(code.into());
        self
    }

    /// Attach an estimated savings amount.
    pub fn with_savings(mut self, savings: f64) -> Self {
        self.savings = Some(savings);
        self
    }
}

/// An expected (ground-truth) issue.
///
/// Issues marked `should_detect = false` are tracked for future detector
/// calibration but excluded from precision/recall denominators: a detector
/// is never penalized for missing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedIssue {
    /// The expected finding.
    #[serde(flatten)]
    pub issue: Issue,
    /// Whether the class of detector under test is expected to find this.
    #[serde(default = "default_true")]
    pub should_detect: bool,
}

fn default_true() -> bool {
    true
}

impl ExpectedIssue {
    /// Expected issue the detector should find.
    pub fn detectable(issue: Issue) -> Self {
        Self {
            issue,
            should_detect: true,
        }
    }

    /// Expected issue that is too subtle to penalize a miss.
    pub fn subtle(issue: Issue) -> Self {
        Self {
            issue,
            should_detect: false,
        }
    }
}

// =============================================================================
// Evaluation results
// =============================================================================

/// Which metric a threshold or query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// TP / (TP + FP).
    Precision,
    /// TP / (TP + FN).
    Recall,
    /// Harmonic mean of precision and recall.
    F1,
}

impl MetricKind {
    /// Stable string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::F1 => "f1",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "precision" => Ok(Self::Precision),
            "recall" => Ok(Self::Recall),
            "f1" => Ok(Self::F1),
            other => Err(crate::Error::invalid_input(format!(
                "unknown metric '{other}' (expected precision, recall, or f1)"
            ))),
        }
    }
}

/// Matching counts plus derived precision/recall/F1 for one scenario or run.
///
/// Metrics are always finite and in `[0.0, 1.0]`. When a denominator is
/// zero the derived metric is `0.0`, keeping downstream aggregation total
/// and comparable; see [`crate::eval::ZeroDenominator`] for the alternative
/// reporting policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Detected issues that consumed an expected slot.
    pub true_positives: u64,
    /// Detected issues with no matching expected slot.
    pub false_positives: u64,
    /// Expected (detectable) issues no detection consumed.
    pub false_negatives: u64,
    /// TP / (TP + FP), or 0.0 when nothing was detected.
    pub precision: f64,
    /// TP / (TP + FN), or 0.0 when nothing was expected.
    pub recall: f64,
    /// 2PR / (P + R), or 0.0 when both are zero.
    pub f1: f64,
}

impl EvaluationResult {
    /// Derive metrics from raw counts under the zero-is-zero policy.
    pub fn from_counts(true_positives: u64, false_positives: u64, false_negatives: u64) -> Self {
        let tp = true_positives as f64;
        let detected = true_positives + false_positives;
        let expected = true_positives + false_negatives;

        let precision = if detected > 0 {
            tp / detected as f64
        } else {
            0.0
        };
        let recall = if expected > 0 {
            tp / expected as f64
        } else {
            0.0
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            true_positives,
            false_positives,
            false_negatives,
            precision,
            recall,
            f1,
        }
    }

    /// An all-zero result, the valid outcome of an empty scenario.
    pub fn empty() -> Self {
        Self::from_counts(0, 0, 0)
    }

    /// Read one metric by kind.
    pub fn metric(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Precision => self.precision,
            MetricKind::Recall => self.recall,
            MetricKind::F1 => self.f1,
        }
    }
}

// =============================================================================
// Snapshot keys, transactions, snapshots
// =============================================================================

/// Composite key identifying one tracked benchmark configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    /// Model identifier, e.g. `"gpt-4o-2024-08-06"`.
    pub model_version: String,
    /// Ground-truth dataset identifier.
    pub dataset_version: String,
    /// Deployment environment, e.g. `"ci"` or `"production"`.
    pub environment: String,
}

impl SnapshotKey {
    /// Build a key from its three parts.
    pub fn new(
        model_version: impl Into<String>,
        dataset_version: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            model_version: model_version.into(),
            dataset_version: dataset_version.into(),
            environment: environment.into(),
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.model_version, self.dataset_version, self.environment
        )
    }
}

/// One immutable record of a single benchmark run.
///
/// Created exactly once by the upsert coordinator and never updated or
/// deleted by the application. Regression alerts raised while writing this
/// run are embedded here so the audit trail is self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique id of this run record.
    pub id: Uuid,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
    /// Model under test.
    pub model_version: String,
    /// Ground-truth dataset the run used.
    pub dataset_version: String,
    /// Prompt revision the run used.
    pub prompt_version: String,
    /// Environment the run executed in.
    pub environment: String,
    /// Run-level metrics (summed counts across scenarios).
    pub metrics: EvaluationResult,
    /// Per-scenario outcomes, in evaluation order.
    pub scenario_results: Vec<ScenarioResult>,
    /// Git commit of the harness code, when known.
    pub commit_sha: Option<String>,
    /// External run id; with `model_version` it forms the idempotency key.
    pub run_id: Option<String>,
    /// Who or what triggered the run (`"ci"`, a username, ...).
    pub triggered_by: String,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Regression alerts raised when this run was written.
    pub alerts: Vec<RegressionAlert>,
}

impl Transaction {
    /// The snapshot key this run belongs to.
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::new(
            self.model_version.clone(),
            self.dataset_version.clone(),
            self.environment.clone(),
        )
    }
}

/// Input to [`crate::store::BenchmarkStore::upsert`]: a benchmark run that
/// has been evaluated but not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRun {
    /// Model under test.
    pub model_version: String,
    /// Ground-truth dataset the run used.
    pub dataset_version: String,
    /// Prompt revision the run used.
    pub prompt_version: String,
    /// Environment the run executed in.
    pub environment: String,
    /// Run-level metrics.
    pub metrics: EvaluationResult,
    /// Per-scenario outcomes.
    pub scenario_results: Vec<ScenarioResult>,
    /// Git commit of the harness code, when known.
    pub commit_sha: Option<String>,
    /// External run id (idempotency token together with `model_version`).
    pub run_id: Option<String>,
    /// Who or what triggered the run.
    pub triggered_by: String,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

impl NewRun {
    /// The snapshot key this run will upsert.
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::new(
            self.model_version.clone(),
            self.dataset_version.clone(),
            self.environment.clone(),
        )
    }
}

/// Latest-known (or historical) metrics row for a snapshot key.
///
/// Exactly one row per key has `is_current = true` at any time. Versions
/// are strictly increasing per key and never reused; a checkout allocates a
/// fresh version pointing back at an old transaction rather than
/// resurrecting an old version number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Key the snapshot belongs to.
    #[serde(flatten)]
    pub key: SnapshotKey,
    /// Monotonically increasing version within the key.
    pub snapshot_version: i64,
    /// Whether this row is the key's current pointer.
    pub is_current: bool,
    /// Metrics carried by this version.
    pub metrics: EvaluationResult,
    /// The transaction whose metrics this version carries.
    pub transaction_id: Uuid,
    /// When this row was written.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Regression alerts
// =============================================================================

/// How severe a detected regression is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Metric dropped past the configured threshold.
    Warning,
    /// Metric dropped past twice the configured threshold.
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Critical => f.write_str("critical"),
        }
    }
}

/// A metric drop beyond the configured threshold, relative to the previous
/// current snapshot (or an explicit baseline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionAlert {
    /// Metric that regressed.
    pub metric: MetricKind,
    /// Baseline value.
    pub previous_value: f64,
    /// New value.
    pub current_value: f64,
    /// `current_value - previous_value` (negative for a drop).
    pub delta: f64,
    /// Threshold the drop was measured against.
    pub threshold: f64,
    /// Alert severity.
    pub severity: AlertSeverity,
}

// =============================================================================
// Scenario results
// =============================================================================

/// Per-severity matching counts, without derived ratios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// True positives whose expected issue had this severity.
    pub true_positives: u64,
    /// False positives whose detected issue had this severity.
    pub false_positives: u64,
    /// False negatives whose expected issue had this severity.
    pub false_negatives: u64,
}

/// Outcome of evaluating one scenario (one benchmark input document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario identifier, typically the document id.
    pub scenario_id: String,
    /// Matching counts and derived metrics for this scenario.
    pub metrics: EvaluationResult,
    /// Counts broken down by severity.
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub per_severity: std::collections::BTreeMap<Severity, SeverityCounts>,
    /// Total estimated savings across detectable expected issues.
    pub expected_savings: f64,
    /// Total estimated savings across detected issues.
    pub detected_savings: f64,
    /// Records skipped during matching (malformed types etc.).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
