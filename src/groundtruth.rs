//! Ground-truth and detection file loading.
//!
//! Ground truth is hand-authored: one record per benchmark input document,
//! each listing the issues the document is known to contain. Detection
//! files carry the same shape minus `should_detect`, produced by whatever
//! harness called the model. Both are JSON arrays:
//!
//! ```json
//! [
//!   {
//!     "document_id": "bill-0042",
//!     "expected_issues": [
//!       {
//!         "type": "duplicate_charge",
//!         "cpt_code": "99213",
//!         "severity": "high",
//!         "should_detect": true,
//!         "expected_savings": 120.0
//!       }
//!     ]
//!   }
//! ]
//! ```
//!
//! `should_detect` defaults to `true` when absent. Loading validates
//! document ids (non-empty, unique) but deliberately not issue types: a
//! malformed issue must not abort an entire benchmark run, so the
//! evaluator skips it with a warning instead (see `crate::eval`).

use crate::types::{ExpectedIssue, Issue, Severity};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One ground-truth record: a document and its known issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthDocument {
    /// Benchmark input document this record annotates.
    pub document_id: String,
    /// Issues the document is known to contain.
    pub expected_issues: Vec<GroundTruthIssue>,
}

/// One expected issue as authored in a ground-truth file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthIssue {
    /// Issue type label.
    #[serde(rename = "type")]
    pub issue_type: String,
    /// CPT code of the affected line item, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpt_code: Option<String>,
    /// Severity of the finding.
    pub severity: Severity,
    /// Whether the class of detector under test should find this.
    #[serde(default = "default_true")]
    pub should_detect: bool,
    /// Estimated recoverable amount, when estimated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_savings: Option<f64>,
}

fn default_true() -> bool {
    true
}

impl GroundTruthIssue {
    /// Convert into the evaluator's expected-issue form.
    pub fn into_expected(self) -> ExpectedIssue {
        ExpectedIssue {
            issue: Issue {
                issue_type: self.issue_type,
                cpt_code: self.cpt_code,
                severity: self.severity,
                savings: self.expected_savings,
            },
            should_detect: self.should_detect,
        }
    }
}

/// One detection record: a document and the issues a model found in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedDocument {
    /// Benchmark input document the detections belong to.
    pub document_id: String,
    /// Issues the model reported.
    pub detected_issues: Vec<Issue>,
}

/// Load and validate a ground-truth file.
pub fn load_ground_truth(path: impl AsRef<Path>) -> Result<Vec<GroundTruthDocument>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    let docs: Vec<GroundTruthDocument> = serde_json::from_str(&raw).map_err(|e| {
        Error::validation(format!("ground truth file {}: {e}", path.display()))
    })?;
    validate_document_ids(docs.iter().map(|d| d.document_id.as_str()), "ground truth")?;
    Ok(docs)
}

/// Load and validate a detections file.
pub fn load_detections(path: impl AsRef<Path>) -> Result<Vec<DetectedDocument>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    let docs: Vec<DetectedDocument> = serde_json::from_str(&raw).map_err(|e| {
        Error::validation(format!("detections file {}: {e}", path.display()))
    })?;
    validate_document_ids(docs.iter().map(|d| d.document_id.as_str()), "detections")?;
    Ok(docs)
}

fn validate_document_ids<'a>(
    ids: impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err(Error::validation(format!(
                "{what} record with empty document_id"
            )));
        }
        if !seen.insert(id.to_string()) {
            return Err(Error::validation(format!(
                "{what} contains duplicate document_id '{id}'"
            )));
        }
    }
    Ok(())
}
