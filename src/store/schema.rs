//! Table definitions and additive migrations.
//!
//! `create_tables` establishes the base schema; `migrate` applies additive
//! column migrations and is safe to run on every open. Both run inside
//! [`super::BenchmarkStore::open_with_config`].

use rusqlite::Connection;

/// Create the base tables and indexes if they do not exist.
///
/// The partial unique index on `snapshots` is what enforces the
/// at-most-one-current-row-per-key invariant even against writers that
/// bypass the in-process per-key locks (e.g. a second process).
pub(crate) fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS transactions (\
           id TEXT PRIMARY KEY,\
           created_at INTEGER NOT NULL,\
           model_version TEXT NOT NULL,\
           dataset_version TEXT NOT NULL,\
           prompt_version TEXT NOT NULL,\
           environment TEXT NOT NULL,\
           true_positives INTEGER NOT NULL,\
           false_positives INTEGER NOT NULL,\
           false_negatives INTEGER NOT NULL,\
           precision REAL NOT NULL,\
           recall REAL NOT NULL,\
           f1 REAL NOT NULL,\
           scenario_results TEXT NOT NULL DEFAULT '[]',\
           commit_sha TEXT,\
           run_id TEXT,\
           triggered_by TEXT NOT NULL,\
           tags TEXT NOT NULL DEFAULT '[]'\
         );\
         CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_run_key \
           ON transactions(run_id, model_version) WHERE run_id IS NOT NULL;\
         CREATE INDEX IF NOT EXISTS idx_transactions_model_time \
           ON transactions(model_version, created_at);\
         CREATE TABLE IF NOT EXISTS snapshots (\
           model_version TEXT NOT NULL,\
           dataset_version TEXT NOT NULL,\
           environment TEXT NOT NULL,\
           snapshot_version INTEGER NOT NULL,\
           is_current INTEGER NOT NULL DEFAULT 0,\
           true_positives INTEGER NOT NULL,\
           false_positives INTEGER NOT NULL,\
           false_negatives INTEGER NOT NULL,\
           precision REAL NOT NULL,\
           recall REAL NOT NULL,\
           f1 REAL NOT NULL,\
           transaction_id TEXT NOT NULL REFERENCES transactions(id),\
           updated_at INTEGER NOT NULL,\
           PRIMARY KEY (model_version, dataset_version, environment, snapshot_version)\
         );\
         CREATE UNIQUE INDEX IF NOT EXISTS idx_snapshots_current \
           ON snapshots(model_version, dataset_version, environment) WHERE is_current = 1;",
    )
}

/// Apply additive column migrations.
///
/// Each ALTER TABLE is tolerated failing with "duplicate column name" so
/// the list can grow over time and still run against every schema vintage.
pub(crate) fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let migrations = [
        "ALTER TABLE transactions ADD COLUMN notes TEXT",
        "ALTER TABLE transactions ADD COLUMN alerts TEXT NOT NULL DEFAULT '[]'",
    ];
    for sql in &migrations {
        match conn.execute(sql, []) {
            Ok(_) => {}
            Err(e) if e.to_string().contains("duplicate column name") => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
