//! Regression detection against the previous current snapshot.
//!
//! Invoked by the upsert coordinator right after a run is evaluated, using
//! the snapshot that is about to be replaced as the baseline. A drop in
//! the primary metric beyond the configured threshold raises a warning
//! alert; beyond twice the threshold, a critical one. The first run for a
//! key has no baseline and raises nothing.
//!
//! Detection must never block a benchmark write: internal failures (a
//! malformed baseline, a nonsensical threshold) are logged at `warn` and
//! treated as "no alert".

use crate::types::{AlertSeverity, EvaluationResult, MetricKind, RegressionAlert};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for regression detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionConfig {
    /// Metric compared against the baseline.
    pub metric: MetricKind,
    /// Drop (in absolute metric units) that triggers a warning; twice
    /// this triggers a critical alert.
    pub threshold: f64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            metric: MetricKind::F1,
            threshold: 0.05,
        }
    }
}

/// Compare new metrics against a baseline, returning an alert when the
/// configured threshold is crossed.
///
/// `None` baseline (first run for a key) yields no alert, never an error.
/// Detector failures are logged and suppressed so that regression
/// *detection* can never block a benchmark *write*.
#[must_use]
pub fn detect_regression(
    baseline: Option<&EvaluationResult>,
    current: &EvaluationResult,
    config: &RegressionConfig,
) -> Option<RegressionAlert> {
    match try_detect(baseline, current, config) {
        Ok(alert) => alert,
        Err(e) => {
            log::warn!("regression detection failed, suppressing alert: {e}");
            None
        }
    }
}

fn try_detect(
    baseline: Option<&EvaluationResult>,
    current: &EvaluationResult,
    config: &RegressionConfig,
) -> Result<Option<RegressionAlert>> {
    let baseline = match baseline {
        Some(b) => b,
        None => return Ok(None),
    };

    if !(config.threshold > 0.0) || !config.threshold.is_finite() {
        return Err(Error::regression(format!(
            "threshold must be a positive finite number, got {}",
            config.threshold
        )));
    }

    let previous_value = baseline.metric(config.metric);
    let current_value = current.metric(config.metric);
    if !previous_value.is_finite() || !current_value.is_finite() {
        return Err(Error::regression(format!(
            "non-finite {} values: baseline={previous_value}, current={current_value}",
            config.metric
        )));
    }

    let delta = current_value - previous_value;
    let severity = if delta <= -2.0 * config.threshold {
        AlertSeverity::Critical
    } else if delta <= -config.threshold {
        AlertSeverity::Warning
    } else {
        return Ok(None);
    };

    log::warn!(
        "{severity} regression on {}: {previous_value:.4} -> {current_value:.4} \
         (delta {delta:+.4}, threshold {})",
        config.metric,
        config.threshold
    );

    Ok(Some(RegressionAlert {
        metric: config.metric,
        previous_value,
        current_value,
        delta,
        threshold: config.threshold,
        severity,
    }))
}
