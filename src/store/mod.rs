//! SQLite-backed persistence: append-only transaction log plus versioned
//! snapshot store.
//!
//! Two logical tables back the engine:
//!
//! - `transactions`: one immutable row per benchmark run, never updated
//!   or deleted by the application. The sole source of truth for
//!   time-series queries.
//! - `snapshots`: versioned "latest state" rows keyed by
//!   (model_version, dataset_version, environment). Exactly one row per
//!   key carries `is_current = 1`; old rows are only ever flipped to
//!   non-current, never removed, so the full version history stays
//!   available for audit and rollback.
//!
//! [`BenchmarkStore::upsert`] is the only write path into either table.
//! It serializes writers per composite key and commits the transaction
//! append, the version bump, and the current-pointer flip as a single
//! SQLite transaction, so readers see either the old or the new current
//! row, never zero or two. Unrelated keys upsert fully in parallel.

mod history;
mod schema;
mod snapshots;
mod transactions;

pub use history::{ModelComparisonRow, SnapshotDiff, SnapshotFilter};
pub use snapshots::UpsertOutcome;
pub use transactions::TransactionFilter;

use crate::regression::RegressionConfig;
use crate::types::{NewRun, SnapshotKey};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Store-level configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Environments accepted by [`BenchmarkStore::upsert`]. An empty set
    /// disables the check.
    pub environments: BTreeSet<String>,
    /// Regression detection settings applied on every upsert.
    pub regression: RegressionConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            environments: ["dev", "ci", "staging", "production"]
                .into_iter()
                .map(String::from)
                .collect(),
            regression: RegressionConfig::default(),
        }
    }
}

/// SQLite-backed benchmark store.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. The
/// connection sits behind a mutex, and writers to the same snapshot key
/// additionally serialize on a per-key lock held only across the
/// version-compute-and-flip sequence, never across evaluation.
pub struct BenchmarkStore {
    conn: Mutex<Connection>,
    key_locks: Mutex<HashMap<SnapshotKey, Arc<Mutex<()>>>>,
    config: StoreConfig,
}

impl BenchmarkStore {
    /// Open (creating if needed) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Open a store with explicit configuration.
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;\
             PRAGMA synchronous=NORMAL;\
             PRAGMA foreign_keys=ON;\
             PRAGMA busy_timeout=5000;",
        )?;
        schema::create_tables(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            key_locks: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Default store path: `$BENCHVAULT_STORE` or `.benchvault.sqlite3`
    /// in the working directory.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("BENCHVAULT_STORE") {
            return PathBuf::from(path);
        }
        PathBuf::from(".benchvault.sqlite3")
    }

    /// Store configuration in effect.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The advisory lock for one snapshot key, created lazily.
    pub(crate) fn key_lock(&self, key: &SnapshotKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock();
        locks.entry(key.clone()).or_default().clone()
    }

    /// Lock the connection for a read-only query.
    pub(crate) fn conn(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Validate a run record before it enters the write path.
    pub(crate) fn validate_run(&self, run: &NewRun) -> Result<()> {
        for (field, value) in [
            ("model_version", &run.model_version),
            ("dataset_version", &run.dataset_version),
            ("prompt_version", &run.prompt_version),
            ("environment", &run.environment),
            ("triggered_by", &run.triggered_by),
        ] {
            if value.trim().is_empty() {
                return Err(Error::validation(format!("missing required field {field}")));
            }
        }
        if !self.config.environments.is_empty()
            && !self.config.environments.contains(&run.environment)
        {
            return Err(Error::validation(format!(
                "unknown environment '{}' (known: {})",
                run.environment,
                self.config
                    .environments
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        let m = &run.metrics;
        if !m.precision.is_finite() || !m.recall.is_finite() || !m.f1.is_finite() {
            return Err(Error::validation(format!(
                "non-finite metrics: precision={}, recall={}, f1={}",
                m.precision, m.recall, m.f1
            )));
        }
        Ok(())
    }
}

// =============================================================================
// SQL conversion helpers
// =============================================================================

pub(crate) fn sql_uuid(idx: usize, s: String) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn sql_datetime(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            format!("timestamp {millis} out of range").into(),
        )
    })
}

pub(crate) fn sql_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    s: String,
) -> rusqlite::Result<T> {
    serde_json::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
