//! Criterion benchmarks for the runner.
//!
//! Run with: `cargo bench -p ticktape-runner`
//!
//! - Metrics over equity curves of increasing length
//! - Seed sweeps, parallel vs sequential

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ticktape_core::domain::EquitySnapshot;
use ticktape_core::strategy::StrategyConfig;
use ticktape_runner::metrics::{max_drawdown_pct, sharpe_ratio, BarInterval, PerformanceMetrics};
use ticktape_runner::{synthetic_ticks, RunConfig, SeedSweep};

fn equity_curve(n: usize) -> Vec<EquitySnapshot> {
    let start = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| EquitySnapshot {
            timestamp: start + Duration::minutes(i as i64),
            equity: 100_000.0 + (i as f64 * 0.05).sin() * 2_000.0 + i as f64,
        })
        .collect()
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");

    for size in [100, 1_000, 10_000].iter() {
        let curve = equity_curve(*size);
        let values: Vec<f64> = curve.iter().map(|s| s.equity).collect();

        group.bench_with_input(BenchmarkId::new("compute", size), size, |b, _| {
            b.iter(|| {
                PerformanceMetrics::compute(
                    black_box(&curve),
                    &[],
                    BarInterval::Minutes(1),
                    0.0,
                    0.0,
                )
            });
        });
        group.bench_with_input(BenchmarkId::new("sharpe", size), size, |b, _| {
            b.iter(|| sharpe_ratio(black_box(&values), 252.0 * 390.0));
        });
        group.bench_with_input(BenchmarkId::new("max_drawdown", size), size, |b, _| {
            b.iter(|| max_drawdown_pct(black_box(&values)));
        });
    }

    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("seed_sweep");
    group.sample_size(10);

    let ticks = synthetic_ticks(
        &["SPY".to_string()],
        Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
        Duration::days(1),
        1_000,
        7,
    )
    .unwrap()
    .ticks;
    let config = RunConfig {
        symbols: vec!["SPY".to_string()],
        strategy: StrategyConfig::Cycle,
        fill_rate: 0.5,
        cancel_probability: 0.2,
        ..RunConfig::default()
    };

    for parallel in [true, false] {
        let label = if parallel { "parallel" } else { "sequential" };
        group.bench_function(BenchmarkId::new(label, 32), |b| {
            b.iter(|| {
                SeedSweep::new(32, 1)
                    .with_parallelism(parallel)
                    .run(black_box(&config), &ticks)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_metrics, bench_sweep);
criterion_main!(benches);
