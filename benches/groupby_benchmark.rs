//! Grouping and resampling benchmarks
//!
//! Covers hash grouping with serial and parallel evaluation, transforms, and
//! time-bucketed resampling of a minute series.

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tabrs::config::EngineConfig;
use tabrs::{AggFunc, GroupKey, Series, Window};

/// Values with `groups` distinct keys spread by a small LCG
fn keyed_series(n: usize, groups: i64) -> (Series, Vec<i64>) {
    let mut state: u64 = 42;
    let mut keys = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        keys.push(((state >> 33) as i64) % groups);
        values.push((state >> 40) as f64 / 1024.0);
    }
    (Series::from_values(values, Some("v".to_string())).unwrap(), keys)
}

fn minute_series(n: i64) -> Series {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let labels: Vec<_> = (0..n).map(|i| start + Duration::minutes(i)).collect();
    let values: Vec<f64> = (0..n).map(|i| (i % 97) as f64).collect();
    Series::from_labeled(labels, values, Some("v".to_string())).unwrap()
}

fn bench_groupby_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("groupby_sum");
    for &groups in &[10i64, 1_000] {
        let (series, keys) = keyed_series(100_000, groups);
        for (label, threads) in [("serial", 1usize), ("parallel", num_cpus::get())] {
            let config = EngineConfig::new()
                .with_max_threads(threads)
                .with_parallel_group_threshold(1);
            group.bench_with_input(BenchmarkId::new(label, groups), &groups, |b, _| {
                b.iter(|| {
                    series
                        .groupby(GroupKey::values(keys.clone()))
                        .unwrap()
                        .with_config(config.clone())
                        .agg(&AggFunc::Sum)
                        .unwrap()
                })
            });
        }
    }
    group.finish();
}

fn bench_transform_mean(c: &mut Criterion) {
    let (series, keys) = keyed_series(50_000, 100);
    c.bench_function("transform_mean", |b| {
        b.iter(|| {
            series
                .groupby(GroupKey::values(keys.clone()))
                .unwrap()
                .transform_agg(&AggFunc::Mean)
                .unwrap()
        })
    });
}

fn bench_resample(c: &mut Criterion) {
    let series = minute_series(100_000);
    let mut group = c.benchmark_group("resample");
    for rule in ["5min", "1H", "1D"] {
        group.bench_with_input(BenchmarkId::new("mean", rule), &rule, |b, rule| {
            b.iter(|| series.resample(black_box(rule)).unwrap().mean().unwrap())
        });
    }
    group.finish();
}

fn bench_rolling(c: &mut Criterion) {
    let series = minute_series(100_000);
    c.bench_function("rolling_mean_60", |b| {
        b.iter(|| series.rolling(Window::Count(60)).unwrap().mean().unwrap())
    });
}

criterion_group!(
    benches,
    bench_groupby_sum,
    bench_transform_mean,
    bench_resample,
    bench_rolling
);
criterion_main!(benches);
