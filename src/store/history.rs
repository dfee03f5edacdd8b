//! Read-side queries: current snapshots, time series, model comparison,
//! version history, and snapshot diffs.
//!
//! Everything here is a projection over the two stores. Time series come
//! from the transaction log (not the snapshot table) so they reflect full
//! history even across checkouts. Readers never block writers: snapshot
//! flips commit atomically, so a query sees either the old or the new
//! current row.

use super::snapshots::{current_row, row_to_snapshot, snapshot_row, SNAPSHOT_COLUMNS};
use super::BenchmarkStore;
use crate::types::{EvaluationResult, MetricKind, Snapshot, SnapshotKey};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Filter for [`BenchmarkStore::current_snapshots`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    /// Only snapshots of this model.
    pub model_version: Option<String>,
    /// Only snapshots of this dataset.
    pub dataset_version: Option<String>,
    /// Only snapshots in this environment.
    pub environment: Option<String>,
}

/// One row of a side-by-side model comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparisonRow {
    /// Model the row describes.
    pub model_version: String,
    /// Dataset the metrics were measured on.
    pub dataset_version: String,
    /// Environment the metrics were measured in.
    pub environment: String,
    /// Current snapshot version for the key.
    pub snapshot_version: i64,
    /// Current metrics for the key.
    pub metrics: EvaluationResult,
    /// When the current snapshot was written.
    pub updated_at: DateTime<Utc>,
}

/// Metric deltas between two snapshot versions of the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Key both versions belong to.
    pub key: SnapshotKey,
    /// Older side of the diff.
    pub from_version: i64,
    /// Newer side of the diff.
    pub to_version: i64,
    /// Transaction backing the `from` side.
    pub from_transaction_id: Uuid,
    /// Transaction backing the `to` side.
    pub to_transaction_id: Uuid,
    /// `to - from` for true positives.
    pub true_positives_delta: i64,
    /// `to - from` for false positives.
    pub false_positives_delta: i64,
    /// `to - from` for false negatives.
    pub false_negatives_delta: i64,
    /// `to - from` for precision.
    pub precision_delta: f64,
    /// `to - from` for recall.
    pub recall_delta: f64,
    /// `to - from` for F1.
    pub f1_delta: f64,
}

impl BenchmarkStore {
    /// Current snapshot rows matching the filter, one per key.
    pub fn current_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>> {
        let conn = self.conn();

        let mut sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE is_current = 1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(model) = &filter.model_version {
            sql.push_str(" AND model_version = ?");
            args.push(Box::new(model.clone()));
        }
        if let Some(dataset) = &filter.dataset_version {
            sql.push_str(" AND dataset_version = ?");
            args.push(Box::new(dataset.clone()));
        }
        if let Some(env) = &filter.environment {
            sql.push_str(" AND environment = ?");
            args.push(Box::new(env.clone()));
        }
        sql.push_str(" ORDER BY model_version, dataset_version, environment");

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_snapshot(row)?);
        }
        Ok(out)
    }

    /// The current snapshot for one key, if the key has ever been written.
    pub fn current_snapshot(&self, key: &SnapshotKey) -> Result<Option<Snapshot>> {
        let conn = self.conn();
        current_row(&conn, key)
    }

    /// Time series of one metric for a model, sourced from the
    /// transaction log and ordered by run creation time.
    pub fn time_series(
        &self,
        model_version: &str,
        metric: MetricKind,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<(DateTime<Utc>, f64)>> {
        let conn = self.conn();
        let column = match metric {
            MetricKind::Precision => "precision",
            MetricKind::Recall => "recall",
            MetricKind::F1 => "f1",
        };
        let since_millis = since.map_or(i64::MIN, |s| s.timestamp_millis());

        let mut stmt = conn.prepare(&format!(
            "SELECT created_at, {column} FROM transactions \
             WHERE model_version = ?1 AND created_at >= ?2 \
             ORDER BY created_at, id"
        ))?;
        let mut rows = stmt.query(params![model_version, since_millis])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push((super::sql_datetime(0, row.get(0)?)?, row.get(1)?));
        }
        Ok(out)
    }

    /// Latest metrics per model, for side-by-side comparison views.
    pub fn compare_models(
        &self,
        model_versions: &[String],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ModelComparisonRow>> {
        if model_versions.is_empty() {
            return Err(Error::invalid_input("no model versions to compare"));
        }
        let conn = self.conn();

        let placeholders = vec!["?"; model_versions.len()].join(", ");
        let since_millis = since.map_or(i64::MIN, |s| s.timestamp_millis());
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = model_versions
            .iter()
            .map(|m| Box::new(m.clone()) as Box<dyn rusqlite::ToSql>)
            .collect();
        args.push(Box::new(since_millis));

        let mut stmt = conn.prepare(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
             WHERE is_current = 1 AND model_version IN ({placeholders}) \
             AND updated_at >= ? \
             ORDER BY model_version, dataset_version, environment"
        ))?;
        let mut rows = stmt.query(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let s = row_to_snapshot(row)?;
            out.push(ModelComparisonRow {
                model_version: s.key.model_version,
                dataset_version: s.key.dataset_version,
                environment: s.key.environment,
                snapshot_version: s.snapshot_version,
                metrics: s.metrics,
                updated_at: s.updated_at,
            });
        }
        Ok(out)
    }

    /// Full version trail for a key, oldest first.
    pub fn snapshot_history(&self, key: &SnapshotKey) -> Result<Vec<Snapshot>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
             WHERE model_version = ?1 AND dataset_version = ?2 AND environment = ?3 \
             ORDER BY snapshot_version"
        ))?;
        let mut rows = stmt.query(params![
            key.model_version,
            key.dataset_version,
            key.environment
        ])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_snapshot(row)?);
        }
        Ok(out)
    }

    /// Metric deltas between two versions of the same key.
    pub fn snapshot_diff(
        &self,
        key: &SnapshotKey,
        from_version: i64,
        to_version: i64,
    ) -> Result<SnapshotDiff> {
        let conn = self.conn();
        let from = snapshot_row(&conn, key, from_version)?
            .ok_or_else(|| Error::not_found(format!("snapshot {key} version {from_version}")))?;
        let to = snapshot_row(&conn, key, to_version)?
            .ok_or_else(|| Error::not_found(format!("snapshot {key} version {to_version}")))?;

        Ok(SnapshotDiff {
            key: key.clone(),
            from_version,
            to_version,
            from_transaction_id: from.transaction_id,
            to_transaction_id: to.transaction_id,
            true_positives_delta: to.metrics.true_positives as i64
                - from.metrics.true_positives as i64,
            false_positives_delta: to.metrics.false_positives as i64
                - from.metrics.false_positives as i64,
            false_negatives_delta: to.metrics.false_negatives as i64
                - from.metrics.false_negatives as i64,
            precision_delta: to.metrics.precision - from.metrics.precision,
            recall_delta: to.metrics.recall - from.metrics.recall,
            f1_delta: to.metrics.f1 - from.metrics.f1,
        })
    }
}
