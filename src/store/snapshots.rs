//! The snapshot store and its upsert coordinator.
//!
//! Every write into the engine funnels through [`BenchmarkStore::upsert`]:
//! it appends the run to the transaction log, bumps the per-key snapshot
//! version, and flips the current pointer, all inside one per-key lock
//! and one SQLite `IMMEDIATE` transaction. The evaluator runs entirely
//! before the lock, so contention is held only across the
//! version-compute-and-flip sequence.

use super::{sql_datetime, sql_uuid, transactions, BenchmarkStore};
use crate::regression;
use crate::types::{
    EvaluationResult, NewRun, RegressionAlert, Snapshot, SnapshotKey, Transaction,
};
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(crate) const SNAPSHOT_COLUMNS: &str = "model_version, dataset_version, environment, \
     snapshot_version, is_current, true_positives, false_positives, false_negatives, \
     precision, recall, f1, transaction_id, updated_at";

/// Result of an upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertOutcome {
    /// The current snapshot for the run's key after the call.
    pub snapshot: Snapshot,
    /// Id of the transaction recording the run.
    pub transaction_id: Uuid,
    /// False when an identical run was already recorded (idempotent
    /// resubmission) and nothing was written.
    pub created: bool,
    /// Regression alerts raised by this write.
    pub alerts: Vec<RegressionAlert>,
}

impl BenchmarkStore {
    /// Record a benchmark run: append it to the transaction log and make
    /// it the key's current snapshot, atomically.
    ///
    /// A resubmission carrying the same `(run_id, model_version)` pair is
    /// a no-op success when its counts match the stored run, and a
    /// [`Error::DuplicateTransaction`] when they differ. Regression
    /// detection runs against the previous current snapshot before the
    /// flip; detector failures are logged and never block the write.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for malformed records,
    /// [`Error::DuplicateTransaction`] for conflicting resubmissions, and
    /// [`Error::Sqlite`] / [`Error::Persistence`] for storage failures
    /// (transient; the call is safe to retry with the same `run_id`).
    pub fn upsert(&self, run: NewRun) -> Result<UpsertOutcome> {
        self.validate_run(&run)?;
        let key = run.key();

        let key_lock = self.key_lock(&key);
        let _serialized = key_lock.lock();

        let mut conn = self.conn();
        let db = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(run_id) = &run.run_id {
            if let Some(existing) =
                transactions::find_by_idempotency(&db, run_id, &run.model_version)?
            {
                return resolve_duplicate(&db, &key, &run, &existing);
            }
        }

        let prior = current_row(&db, &key)?;
        let alerts: Vec<RegressionAlert> = regression::detect_regression(
            prior.as_ref().map(|p| &p.metrics),
            &run.metrics,
            &self.config.regression,
        )
        .into_iter()
        .collect();

        let now = Utc::now();
        let record = Transaction {
            id: Uuid::new_v4(),
            created_at: now,
            model_version: run.model_version,
            dataset_version: run.dataset_version,
            prompt_version: run.prompt_version,
            environment: run.environment,
            metrics: run.metrics,
            scenario_results: run.scenario_results,
            commit_sha: run.commit_sha,
            run_id: run.run_id,
            triggered_by: run.triggered_by,
            tags: run.tags,
            notes: run.notes,
            alerts: alerts.clone(),
        };
        transactions::insert_transaction(&db, &record)?;

        let next_version = prior.as_ref().map_or(1, |p| p.snapshot_version + 1);
        // Flip before insert so the partial unique index on is_current
        // holds at every statement boundary inside the transaction.
        if let Some(prior) = &prior {
            clear_current(&db, &key, prior.snapshot_version)?;
        }
        let snapshot = Snapshot {
            key,
            snapshot_version: next_version,
            is_current: true,
            metrics: record.metrics,
            transaction_id: record.id,
            updated_at: now,
        };
        insert_snapshot(&db, &snapshot)?;
        db.commit()?;

        Ok(UpsertOutcome {
            snapshot,
            transaction_id: record.id,
            created: true,
            alerts,
        })
    }

    /// Make a historical snapshot version the key's new current state.
    ///
    /// Creates a fresh snapshot row (new version number, `is_current`)
    /// whose metrics and transaction id are copied from the target
    /// version, and flips the prior current row to false. History is
    /// never mutated: the target row is untouched and the transaction
    /// log is unchanged. A checkout is itself a new, auditable event.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the key or the target version does not
    /// exist.
    pub fn checkout(&self, key: &SnapshotKey, target_version: i64) -> Result<Snapshot> {
        let key_lock = self.key_lock(key);
        let _serialized = key_lock.lock();

        let mut conn = self.conn();
        let db = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let target = snapshot_row(&db, key, target_version)?.ok_or_else(|| {
            Error::not_found(format!("snapshot {key} version {target_version}"))
        })?;
        let prior = current_row(&db, key)?
            .ok_or_else(|| Error::not_found(format!("no current snapshot for {key}")))?;

        clear_current(&db, key, prior.snapshot_version)?;
        let snapshot = Snapshot {
            key: key.clone(),
            snapshot_version: max_version(&db, key)? + 1,
            is_current: true,
            metrics: target.metrics,
            transaction_id: target.transaction_id,
            updated_at: Utc::now(),
        };
        insert_snapshot(&db, &snapshot)?;
        db.commit()?;

        Ok(snapshot)
    }
}

/// Resolve an idempotency-key collision: matching content is a no-op
/// success, differing content is a hard failure.
fn resolve_duplicate(
    conn: &Connection,
    key: &SnapshotKey,
    run: &NewRun,
    existing: &Transaction,
) -> Result<UpsertOutcome> {
    if existing.dataset_version != run.dataset_version
        || existing.environment != run.environment
    {
        return Err(Error::duplicate(format!(
            "run '{}' for model '{}' already recorded against {}/{}, resubmitted for {}/{}",
            run.run_id.as_deref().unwrap_or(""),
            run.model_version,
            existing.dataset_version,
            existing.environment,
            run.dataset_version,
            run.environment,
        )));
    }
    let same = existing.metrics.true_positives == run.metrics.true_positives
        && existing.metrics.false_positives == run.metrics.false_positives
        && existing.metrics.false_negatives == run.metrics.false_negatives;
    if !same {
        return Err(Error::duplicate(format!(
            "run '{}' for model '{}' already recorded with different results \
             (stored TP/FP/FN {}/{}/{}, resubmitted {}/{}/{})",
            run.run_id.as_deref().unwrap_or(""),
            run.model_version,
            existing.metrics.true_positives,
            existing.metrics.false_positives,
            existing.metrics.false_negatives,
            run.metrics.true_positives,
            run.metrics.false_positives,
            run.metrics.false_negatives,
        )));
    }
    log::debug!(
        "idempotent resubmission of run '{}' for {key}; returning stored outcome",
        run.run_id.as_deref().unwrap_or("")
    );
    let snapshot = snapshot_for_transaction(conn, key, existing.id)?
        .or(current_row(conn, key)?)
        .ok_or_else(|| {
            Error::persistence(format!("transaction {} has no snapshot row", existing.id))
        })?;
    Ok(UpsertOutcome {
        snapshot,
        transaction_id: existing.id,
        created: false,
        alerts: existing.alerts.clone(),
    })
}

// =============================================================================
// Row-level helpers, shared with the history queries
// =============================================================================

pub(crate) fn row_to_snapshot(row: &Row<'_>) -> rusqlite::Result<Snapshot> {
    Ok(Snapshot {
        key: SnapshotKey {
            model_version: row.get(0)?,
            dataset_version: row.get(1)?,
            environment: row.get(2)?,
        },
        snapshot_version: row.get(3)?,
        is_current: row.get::<_, i64>(4)? != 0,
        metrics: EvaluationResult {
            true_positives: row.get::<_, i64>(5)? as u64,
            false_positives: row.get::<_, i64>(6)? as u64,
            false_negatives: row.get::<_, i64>(7)? as u64,
            precision: row.get(8)?,
            recall: row.get(9)?,
            f1: row.get(10)?,
        },
        transaction_id: sql_uuid(11, row.get(11)?)?,
        updated_at: sql_datetime(12, row.get(12)?)?,
    })
}

pub(crate) fn current_row(conn: &Connection, key: &SnapshotKey) -> Result<Option<Snapshot>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
                 WHERE model_version = ?1 AND dataset_version = ?2 AND environment = ?3 \
                 AND is_current = 1"
            ),
            params![key.model_version, key.dataset_version, key.environment],
            row_to_snapshot,
        )
        .optional()?)
}

pub(crate) fn snapshot_row(
    conn: &Connection,
    key: &SnapshotKey,
    version: i64,
) -> Result<Option<Snapshot>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
                 WHERE model_version = ?1 AND dataset_version = ?2 AND environment = ?3 \
                 AND snapshot_version = ?4"
            ),
            params![
                key.model_version,
                key.dataset_version,
                key.environment,
                version
            ],
            row_to_snapshot,
        )
        .optional()?)
}

fn snapshot_for_transaction(
    conn: &Connection,
    key: &SnapshotKey,
    transaction_id: Uuid,
) -> Result<Option<Snapshot>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
                 WHERE model_version = ?1 AND dataset_version = ?2 AND environment = ?3 \
                 AND transaction_id = ?4 ORDER BY snapshot_version LIMIT 1"
            ),
            params![
                key.model_version,
                key.dataset_version,
                key.environment,
                transaction_id.to_string()
            ],
            row_to_snapshot,
        )
        .optional()?)
}

fn max_version(conn: &Connection, key: &SnapshotKey) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(snapshot_version), 0) FROM snapshots \
         WHERE model_version = ?1 AND dataset_version = ?2 AND environment = ?3",
        params![key.model_version, key.dataset_version, key.environment],
        |row| row.get(0),
    )?)
}

fn clear_current(conn: &Connection, key: &SnapshotKey, version: i64) -> Result<()> {
    conn.execute(
        "UPDATE snapshots SET is_current = 0 \
         WHERE model_version = ?1 AND dataset_version = ?2 AND environment = ?3 \
         AND snapshot_version = ?4",
        params![
            key.model_version,
            key.dataset_version,
            key.environment,
            version
        ],
    )?;
    Ok(())
}

fn insert_snapshot(conn: &Connection, s: &Snapshot) -> Result<()> {
    conn.execute(
        "INSERT INTO snapshots (model_version, dataset_version, environment, \
         snapshot_version, is_current, true_positives, false_positives, false_negatives, \
         precision, recall, f1, transaction_id, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            s.key.model_version,
            s.key.dataset_version,
            s.key.environment,
            s.snapshot_version,
            s.is_current as i64,
            s.metrics.true_positives as i64,
            s.metrics.false_positives as i64,
            s.metrics.false_negatives as i64,
            s.metrics.precision,
            s.metrics.recall,
            s.metrics.f1,
            s.transaction_id.to_string(),
            s.updated_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}
