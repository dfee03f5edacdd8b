//! The append-only transaction log.
//!
//! Rows are written exactly once by the upsert coordinator and never
//! updated or deleted by the application. Duplicate submissions are
//! rejected by a partial unique index over `(run_id, model_version)` so
//! that CI retries cannot double-count a run. The ordered log is the sole
//! source of truth for time-series queries; snapshot rows are a derived
//! cache of "latest per key".

use super::{sql_datetime, sql_json, sql_uuid, BenchmarkStore};
use crate::types::Transaction;
use crate::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const TRANSACTION_COLUMNS: &str = "id, created_at, model_version, dataset_version, \
     prompt_version, environment, true_positives, false_positives, false_negatives, \
     precision, recall, f1, scenario_results, commit_sha, run_id, triggered_by, tags, \
     notes, alerts";

/// Filter for [`BenchmarkStore::list_transactions`].
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Only runs of this model.
    pub model_version: Option<String>,
    /// Only runs in this environment.
    pub environment: Option<String>,
    /// Only runs created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only runs created before this instant.
    pub until: Option<DateTime<Utc>>,
}

impl BenchmarkStore {
    /// List transactions matching the filter, ordered by creation time.
    pub fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let conn = self.conn();

        let mut sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions");
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(model) = &filter.model_version {
            clauses.push("model_version = ?");
            args.push(Box::new(model.clone()));
        }
        if let Some(env) = &filter.environment {
            clauses.push("environment = ?");
            args.push(Box::new(env.clone()));
        }
        if let Some(since) = &filter.since {
            clauses.push("created_at >= ?");
            args.push(Box::new(since.timestamp_millis()));
        }
        if let Some(until) = &filter.until {
            clauses.push("created_at < ?");
            args.push(Box::new(until.timestamp_millis()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at, id");

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_transaction(row)?);
        }
        Ok(out)
    }

    /// Fetch one transaction by id.
    pub fn get_transaction(&self, id: Uuid) -> Result<Transaction> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
            params![id.to_string()],
            row_to_transaction,
        )
        .optional()?
        .ok_or_else(|| crate::Error::not_found(format!("transaction {id}")))
    }

    /// Number of rows in the log. The log only ever grows.
    pub fn transaction_count(&self) -> Result<i64> {
        let conn = self.conn();
        Ok(conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?)
    }
}

/// Look up a prior run by its idempotency key.
pub(crate) fn find_by_idempotency(
    conn: &Connection,
    run_id: &str,
    model_version: &str,
) -> Result<Option<Transaction>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions \
                 WHERE run_id = ?1 AND model_version = ?2"
            ),
            params![run_id, model_version],
            row_to_transaction,
        )
        .optional()?)
}

/// Append one transaction row. Callers hold the write transaction.
pub(crate) fn insert_transaction(conn: &Connection, t: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (id, created_at, model_version, dataset_version, \
         prompt_version, environment, true_positives, false_positives, false_negatives, \
         precision, recall, f1, scenario_results, commit_sha, run_id, triggered_by, tags, \
         notes, alerts) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
         ?17, ?18, ?19)",
        params![
            t.id.to_string(),
            t.created_at.timestamp_millis(),
            t.model_version,
            t.dataset_version,
            t.prompt_version,
            t.environment,
            t.metrics.true_positives as i64,
            t.metrics.false_positives as i64,
            t.metrics.false_negatives as i64,
            t.metrics.precision,
            t.metrics.recall,
            t.metrics.f1,
            serde_json::to_string(&t.scenario_results)?,
            t.commit_sha,
            t.run_id,
            t.triggered_by,
            serde_json::to_string(&t.tags)?,
            t.notes,
            serde_json::to_string(&t.alerts)?,
        ],
    )?;
    Ok(())
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: sql_uuid(0, row.get(0)?)?,
        created_at: sql_datetime(1, row.get(1)?)?,
        model_version: row.get(2)?,
        dataset_version: row.get(3)?,
        prompt_version: row.get(4)?,
        environment: row.get(5)?,
        metrics: crate::types::EvaluationResult {
            true_positives: row.get::<_, i64>(6)? as u64,
            false_positives: row.get::<_, i64>(7)? as u64,
            false_negatives: row.get::<_, i64>(8)? as u64,
            precision: row.get(9)?,
            recall: row.get(10)?,
            f1: row.get(11)?,
        },
        scenario_results: sql_json(12, row.get(12)?)?,
        commit_sha: row.get(13)?,
        run_id: row.get(14)?,
        triggered_by: row.get(15)?,
        tags: sql_json(16, row.get(16)?)?,
        notes: row.get(17)?,
        alerts: sql_json(18, row.get(18)?)?,
    })
}
