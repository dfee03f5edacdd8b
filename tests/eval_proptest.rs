//! Property tests for the evaluator.
//!
//! Tests invariants that should hold for all inputs, not just the
//! hand-picked cases in the invariant suite.

use benchvault::eval::{aggregate_scenarios, canonical_type, evaluate, evaluate_scenario};
use benchvault::{EvaluationResult, ExpectedIssue, Issue, Severity};
use proptest::prelude::*;

/// A small closed alphabet of type labels so collisions actually happen.
fn arb_issue_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("duplicate_charge".to_string()),
        Just("Duplicate Charge".to_string()),
        Just("excessive_charge".to_string()),
        Just("unbundling".to_string()),
        Just("upcoding".to_string()),
        Just("phantom-charge".to_string()),
        "[a-z]{1,8}".prop_map(|s| s),
    ]
}

fn arb_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

fn arb_issue() -> impl Strategy<Value = Issue> {
    (arb_issue_type(), arb_severity()).prop_map(|(t, s)| Issue::new(t, s))
}

fn arb_expected() -> impl Strategy<Value = ExpectedIssue> {
    (arb_issue(), any::<bool>()).prop_map(|(issue, should_detect)| ExpectedIssue {
        issue,
        should_detect,
    })
}

proptest! {
    #[test]
    fn metrics_always_bounded(
        detected in prop::collection::vec(arb_issue(), 0..20),
        expected in prop::collection::vec(arb_expected(), 0..20),
    ) {
        let r = evaluate(&detected, &expected);
        prop_assert!((0.0..=1.0).contains(&r.precision));
        prop_assert!((0.0..=1.0).contains(&r.recall));
        prop_assert!((0.0..=1.0).contains(&r.f1));
        prop_assert!(r.precision.is_finite());
        prop_assert!(r.recall.is_finite());
        prop_assert!(r.f1.is_finite());
    }

    #[test]
    fn counts_are_conserved(
        detected in prop::collection::vec(arb_issue(), 0..20),
        expected in prop::collection::vec(arb_expected(), 0..20),
    ) {
        let r = evaluate(&detected, &expected);

        let usable_detected = detected
            .iter()
            .filter(|d| !canonical_type(&d.issue_type).is_empty())
            .count() as u64;
        let considered = expected
            .iter()
            .filter(|e| e.should_detect && !canonical_type(&e.issue.issue_type).is_empty())
            .count() as u64;

        // Every usable detection is exactly one of TP or FP; every
        // considered expectation is exactly one of matched or FN.
        prop_assert_eq!(r.true_positives + r.false_positives, usable_detected);
        prop_assert_eq!(r.true_positives + r.false_negatives, considered);
    }

    #[test]
    fn detection_order_never_changes_counts(
        detected in prop::collection::vec(arb_issue(), 0..20).prop_shuffle(),
        expected in prop::collection::vec(arb_expected(), 0..20),
    ) {
        let shuffled = evaluate(&detected, &expected);

        let mut sorted = detected.clone();
        sorted.sort_by(|a, b| a.issue_type.cmp(&b.issue_type));
        let canonical_order = evaluate(&sorted, &expected);

        prop_assert_eq!(shuffled.true_positives, canonical_order.true_positives);
        prop_assert_eq!(shuffled.false_positives, canonical_order.false_positives);
        prop_assert_eq!(shuffled.false_negatives, canonical_order.false_negatives);
    }

    #[test]
    fn non_detectable_expectations_are_inert(
        detected in prop::collection::vec(arb_issue(), 0..20),
        expected in prop::collection::vec(arb_expected(), 0..20),
    ) {
        let full = evaluate(&detected, &expected);

        let detectable_only: Vec<ExpectedIssue> = expected
            .iter()
            .filter(|e| e.should_detect)
            .cloned()
            .collect();
        let filtered = evaluate(&detected, &detectable_only);

        prop_assert_eq!(full.true_positives, filtered.true_positives);
        prop_assert_eq!(full.false_positives, filtered.false_positives);
        prop_assert_eq!(full.false_negatives, filtered.false_negatives);
    }

    #[test]
    fn f1_is_harmonic_mean(
        tp in 0u64..1000,
        fp in 0u64..1000,
        fn_count in 0u64..1000,
    ) {
        let r = EvaluationResult::from_counts(tp, fp, fn_count);
        if r.precision + r.recall > 0.0 {
            let expected_f1 = 2.0 * r.precision * r.recall / (r.precision + r.recall);
            prop_assert!((r.f1 - expected_f1).abs() < 1e-10);
        } else {
            prop_assert_eq!(r.f1, 0.0);
        }
    }

    #[test]
    fn scenario_split_never_changes_run_counts(
        issues in prop::collection::vec((arb_issue(), arb_expected()), 1..16),
        split in 0usize..16,
    ) {
        let detected: Vec<Issue> = issues.iter().map(|(d, _)| d.clone()).collect();
        let expected: Vec<ExpectedIssue> = issues.iter().map(|(_, e)| e.clone()).collect();
        let split = split.min(detected.len());

        // One big scenario...
        let whole = evaluate_scenario("all", &detected, &expected);
        // ...versus the same issues split across two scenarios. The
        // per-scenario F1s differ, but summed counts must not.
        let parts = vec![
            evaluate_scenario("a", &detected[..split], &expected[..split]),
            evaluate_scenario("b", &detected[split..], &expected[split..]),
        ];
        let run = aggregate_scenarios(&parts);

        // Matching is per-scenario, so splitting can move a match across
        // the TP/FP boundary; totals of detections and expectations still
        // reconcile.
        prop_assert_eq!(
            run.true_positives + run.false_positives,
            whole.metrics.true_positives + whole.metrics.false_positives
        );
        prop_assert_eq!(
            whole.metrics.true_positives + whole.metrics.false_negatives,
            run.true_positives + run.false_negatives
        );
    }

    #[test]
    fn canonicalization_is_idempotent(raw in ".{0,40}") {
        let once = canonical_type(&raw);
        prop_assert_eq!(canonical_type(&once), once.clone());
        // Canonical output only ever contains lowercase alphanumerics
        // and single underscores.
        prop_assert!(!once.starts_with('_'));
        prop_assert!(!once.ends_with('_'));
        prop_assert!(!once.contains("__"));
    }
}
