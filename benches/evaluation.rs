//! Evaluator throughput benchmarks.
//!
//! The matcher runs once per scenario on the benchmark hot path, entirely
//! outside the store's locks, so its cost bounds how fast CI fan-out can
//! evaluate.
//!
//! ```bash
//! cargo bench --bench evaluation
//! ```

use benchvault::eval::{canonical_type, evaluate};
use benchvault::{ExpectedIssue, Issue, Severity};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const TYPES: [&str; 8] = [
    "Duplicate Charge",
    "excessive_charge",
    "unbundling",
    "Upcoding (E/M)",
    "phantom-charge",
    "balance_billing",
    "modifier misuse",
    "units_error",
];

fn scenario(n: usize) -> (Vec<Issue>, Vec<ExpectedIssue>) {
    let detected = (0..n)
        .map(|i| Issue::new(TYPES[i % TYPES.len()], Severity::High))
        .collect();
    let expected = (0..n)
        .map(|i| ExpectedIssue::detectable(Issue::new(TYPES[(i * 3) % TYPES.len()], Severity::High)))
        .collect();
    (detected, expected)
}

fn bench_canonicalize(c: &mut Criterion) {
    c.bench_function("canonical_type", |b| {
        b.iter(|| {
            for t in TYPES {
                black_box(canonical_type(black_box(t)));
            }
        })
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let (small_d, small_e) = scenario(10);
    c.bench_function("evaluate/10_issues", |b| {
        b.iter(|| black_box(evaluate(black_box(&small_d), black_box(&small_e))))
    });

    let (large_d, large_e) = scenario(1000);
    c.bench_function("evaluate/1000_issues", |b| {
        b.iter(|| black_box(evaluate(black_box(&large_d), black_box(&large_e))))
    });
}

criterion_group!(benches, bench_canonicalize, bench_evaluate);
criterion_main!(benches);
