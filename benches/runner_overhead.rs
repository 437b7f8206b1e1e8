//! Runner overhead benchmarks
//!
//! Measures the cost the runner adds around trivial trial functions:
//! spawning, permit acquisition, context scoping and ordered collection.
//!
//! Toyota Way: Genchi Genbutsu (measure, don't guess)
//!
//! Run with: cargo bench --bench runner_overhead

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use evalrun::experiment::{
    ExperimentStats, ExperimentRunner, TraceStats, Trial, TrialFn,
};

fn trials(n: usize) -> Vec<Trial<u64, u64>> {
    let func: Arc<dyn TrialFn<u64, u64>> =
        Arc::new(|x: u64| async move { Ok::<_, anyhow::Error>(x.wrapping_mul(31)) });
    (0..n)
        .map(|i| Trial::new(Arc::new(i as u64), i, 0, Arc::clone(&func), "bench"))
        .collect()
}

/// Benchmark run_trials for increasing trial counts and bounds
fn bench_run_trials(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("run_trials");

    for &n in &[10usize, 100, 1_000] {
        for &bound in &[1usize, 10, 100] {
            group.bench_with_input(
                BenchmarkId::new(format!("bound_{bound}"), n),
                &n,
                |b, &n| {
                    b.to_async(&runtime).iter(|| async move {
                        let runner = ExperimentRunner::new(bound).unwrap();
                        black_box(runner.run_trials(trials(n)).await)
                    });
                },
            );
        }
    }

    group.finish();
}

/// Benchmark per-metric reductions over trace records
fn bench_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("experiment_stats");

    for &n in &[100usize, 10_000] {
        let stats = ExperimentStats::new(
            (0..n)
                .map(|i| {
                    TraceStats::new(format!("t{i}"))
                        .with_score("accuracy", (i % 2) as f64)
                        .with_score("relevance", (i % 5) as f64 / 4.0)
                        .with_latency(0.1 + (i % 7) as f64)
                })
                .collect(),
        );
        group.bench_with_input(BenchmarkId::new("avg_std", n), &stats, |b, stats| {
            b.iter(|| black_box(stats).avg_std());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_run_trials, bench_stats);
criterion_main!(benches);
