//! Store invariants: single current row, gapless versions, idempotency,
//! atomic writes under concurrency.

use benchvault::store::{BenchmarkStore, TransactionFilter};
use benchvault::{Error, EvaluationResult, NewRun, SnapshotKey};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

fn temp_store() -> (TempDir, BenchmarkStore) {
    let dir = TempDir::new().expect("tempdir");
    let store = BenchmarkStore::open(dir.path().join("bench.sqlite3")).expect("open store");
    (dir, store)
}

fn run_for(model: &str, run_id: Option<&str>, counts: (u64, u64, u64)) -> NewRun {
    NewRun {
        model_version: model.to_string(),
        dataset_version: "bills-v3".to_string(),
        prompt_version: "p7".to_string(),
        environment: "ci".to_string(),
        metrics: EvaluationResult::from_counts(counts.0, counts.1, counts.2),
        scenario_results: Vec::new(),
        commit_sha: Some("abc1234".to_string()),
        run_id: run_id.map(String::from),
        triggered_by: "test".to_string(),
        tags: BTreeSet::new(),
        notes: None,
    }
}

fn key_for(model: &str) -> SnapshotKey {
    SnapshotKey::new(model, "bills-v3", "ci")
}

#[test]
fn first_upsert_creates_version_one() {
    let (_dir, store) = temp_store();
    let outcome = store.upsert(run_for("gpt-4o", None, (8, 2, 2))).unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.snapshot.snapshot_version, 1);
    assert!(outcome.snapshot.is_current);
    assert!(outcome.alerts.is_empty(), "first run has no baseline");
    assert_eq!(store.transaction_count().unwrap(), 1);
}

#[test]
fn sequential_upserts_increment_versions_and_flip_current() {
    let (_dir, store) = temp_store();
    for i in 0..4 {
        store
            .upsert(run_for("gpt-4o", None, (8 + i, 2, 2)))
            .unwrap();
    }

    let history = store.snapshot_history(&key_for("gpt-4o")).unwrap();
    assert_eq!(history.len(), 4);
    let versions: Vec<i64> = history.iter().map(|s| s.snapshot_version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4]);
    let current: Vec<_> = history.iter().filter(|s| s.is_current).collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].snapshot_version, 4);
}

#[test]
fn concurrent_upserts_on_one_key_stay_gapless() {
    let (_dir, store) = temp_store();
    let store = Arc::new(store);
    const WRITERS: usize = 8;

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let run_id = format!("ci-{i}");
                store
                    .upsert(run_for("gpt-4o", Some(&run_id), (i as u64, 1, 1)))
                    .expect("upsert should succeed under contention")
            })
        })
        .collect();
    for h in handles {
        h.join().expect("writer thread panicked");
    }

    let history = store.snapshot_history(&key_for("gpt-4o")).unwrap();
    assert_eq!(history.len(), WRITERS);

    let mut versions: Vec<i64> = history.iter().map(|s| s.snapshot_version).collect();
    versions.sort_unstable();
    assert_eq!(versions, (1..=WRITERS as i64).collect::<Vec<_>>());

    let current_count = history.iter().filter(|s| s.is_current).count();
    assert_eq!(current_count, 1, "exactly one current row per key");
    assert_eq!(store.transaction_count().unwrap(), WRITERS as i64);
}

#[test]
fn two_concurrent_runs_distinct_run_ids() {
    let (_dir, store) = temp_store();
    let store = Arc::new(store);

    let a = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || store.upsert(run_for("gpt-4o", Some("run-a"), (5, 1, 1))))
    };
    let b = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || store.upsert(run_for("gpt-4o", Some("run-b"), (6, 1, 1))))
    };
    a.join().unwrap().unwrap();
    b.join().unwrap().unwrap();

    let current = store.current_snapshot(&key_for("gpt-4o")).unwrap().unwrap();
    assert_eq!(current.snapshot_version, 2);
    assert_eq!(store.transaction_count().unwrap(), 2);
}

#[test]
fn distinct_keys_do_not_contend_on_versions() {
    let (_dir, store) = temp_store();
    store.upsert(run_for("gpt-4o", None, (8, 2, 2))).unwrap();
    store
        .upsert(run_for("gemini-1.5-pro", None, (7, 3, 3)))
        .unwrap();

    let a = store.current_snapshot(&key_for("gpt-4o")).unwrap().unwrap();
    let b = store
        .current_snapshot(&key_for("gemini-1.5-pro"))
        .unwrap()
        .unwrap();
    assert_eq!(a.snapshot_version, 1);
    assert_eq!(b.snapshot_version, 1);
}

#[test]
fn matching_resubmission_is_a_noop_success() {
    let (_dir, store) = temp_store();
    let first = store
        .upsert(run_for("gpt-4o", Some("ci-42"), (8, 2, 2)))
        .unwrap();
    let second = store
        .upsert(run_for("gpt-4o", Some("ci-42"), (8, 2, 2)))
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(second.transaction_id, first.transaction_id);
    assert_eq!(second.snapshot.snapshot_version, 1);
    assert_eq!(store.transaction_count().unwrap(), 1);
}

#[test]
fn conflicting_resubmission_is_rejected() {
    let (_dir, store) = temp_store();
    store
        .upsert(run_for("gpt-4o", Some("ci-42"), (8, 2, 2)))
        .unwrap();
    let err = store
        .upsert(run_for("gpt-4o", Some("ci-42"), (1, 9, 9)))
        .unwrap_err();

    assert!(matches!(err, Error::DuplicateTransaction(_)), "got {err}");
    assert_eq!(store.transaction_count().unwrap(), 1);
}

#[test]
fn same_run_id_different_models_are_independent_runs() {
    let (_dir, store) = temp_store();
    store
        .upsert(run_for("gpt-4o", Some("ci-42"), (8, 2, 2)))
        .unwrap();
    store
        .upsert(run_for("gemini-1.5-pro", Some("ci-42"), (7, 3, 3)))
        .unwrap();
    assert_eq!(store.transaction_count().unwrap(), 2);
}

#[test]
fn unknown_environment_is_rejected() {
    let (_dir, store) = temp_store();
    let mut run = run_for("gpt-4o", None, (8, 2, 2));
    run.environment = "prod-eu".to_string();

    let err = store.upsert(run).unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "got {err}");
    assert_eq!(store.transaction_count().unwrap(), 0);
}

#[test]
fn missing_required_field_is_rejected() {
    let (_dir, store) = temp_store();
    let mut run = run_for("gpt-4o", None, (8, 2, 2));
    run.model_version = "  ".to_string();

    let err = store.upsert(run).unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "got {err}");
}

#[test]
fn regression_alert_is_embedded_in_the_transaction() {
    let (_dir, store) = temp_store();
    // P = R = F1 = 0.8
    store.upsert(run_for("gpt-4o", None, (8, 2, 2))).unwrap();
    // P = R = F1 = 0.3, delta -0.5: critical at the default threshold
    let outcome = store.upsert(run_for("gpt-4o", None, (3, 7, 7))).unwrap();

    assert_eq!(outcome.alerts.len(), 1);
    let alert = &outcome.alerts[0];
    assert_eq!(alert.severity, benchvault::AlertSeverity::Critical);
    assert!((alert.previous_value - 0.8).abs() < 1e-9);
    assert!((alert.current_value - 0.3).abs() < 1e-9);

    let stored = store.get_transaction(outcome.transaction_id).unwrap();
    assert_eq!(stored.alerts, outcome.alerts);
}

#[test]
fn improving_runs_raise_no_alert() {
    let (_dir, store) = temp_store();
    store.upsert(run_for("gpt-4o", None, (3, 7, 7))).unwrap();
    let outcome = store.upsert(run_for("gpt-4o", None, (8, 2, 2))).unwrap();
    assert!(outcome.alerts.is_empty());
}

#[test]
fn transaction_log_is_ordered_and_filterable() {
    let (_dir, store) = temp_store();
    store.upsert(run_for("gpt-4o", None, (5, 5, 5))).unwrap();
    store.upsert(run_for("gpt-4o", None, (6, 4, 4))).unwrap();
    store
        .upsert(run_for("gemini-1.5-pro", None, (7, 3, 3)))
        .unwrap();

    let all = store.list_transactions(&TransactionFilter::default()).unwrap();
    assert_eq!(all.len(), 3);
    for pair in all.windows(2) {
        assert!(pair[0].created_at <= pair[1].created_at);
    }

    let gpt_only = store
        .list_transactions(&TransactionFilter {
            model_version: Some("gpt-4o".to_string()),
            ..TransactionFilter::default()
        })
        .unwrap();
    assert_eq!(gpt_only.len(), 2);

    let none = store
        .list_transactions(&TransactionFilter {
            environment: Some("staging".to_string()),
            ..TransactionFilter::default()
        })
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn scenario_results_round_trip_through_the_log() {
    use benchvault::eval::evaluate_scenario;
    use benchvault::{ExpectedIssue, Issue, Severity};

    let (_dir, store) = temp_store();
    let scenario = evaluate_scenario(
        "bill-001",
        &[Issue::new("Duplicate Charge", Severity::High).with_savings(120.0)],
        &[ExpectedIssue::detectable(
            Issue::new("duplicate_charge", Severity::High).with_savings(100.0),
        )],
    );
    let mut run = run_for("gpt-4o", None, (1, 0, 0));
    run.scenario_results = vec![scenario];

    let outcome = store.upsert(run).unwrap();
    let stored = store.get_transaction(outcome.transaction_id).unwrap();
    assert_eq!(stored.scenario_results.len(), 1);
    let s = &stored.scenario_results[0];
    assert_eq!(s.scenario_id, "bill-001");
    assert_eq!(s.metrics.true_positives, 1);
    assert!((s.expected_savings - 100.0).abs() < 1e-9);
}

#[test]
fn store_reopens_with_history_intact() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bench.sqlite3");
    {
        let store = BenchmarkStore::open(&path).unwrap();
        store.upsert(run_for("gpt-4o", None, (8, 2, 2))).unwrap();
    }
    let store = BenchmarkStore::open(&path).unwrap();
    let current = store.current_snapshot(&key_for("gpt-4o")).unwrap().unwrap();
    assert_eq!(current.snapshot_version, 1);
    assert_eq!(store.transaction_count().unwrap(), 1);
}
