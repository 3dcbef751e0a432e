//! Benchmarks for batch production.
//!
//! Run with: cargo bench --bench batch_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use chrono::{Duration, TimeZone, Utc};
use tsbatch::prelude::*;

/// Create a group of random-walk features over a shared timeline.
fn create_synthetic_group(n_features: usize, n_bars: usize) -> SeriesGroup {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let timeline = Timeline::from_times((0..n_bars).map(|i| start + Duration::hours(i as i64)));

    (0..n_features)
        .map(|f| {
            let mut level = 100.0;
            let values = (0..n_bars)
                .map(|_| {
                    level += rng.gen::<f64>() - 0.5;
                    level
                })
                .collect();
            VecSeries::new(format!("f{}", f), values, timeline.clone()).into_shared()
        })
        .collect()
}

fn bench_next_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_batch");
    let inputs = create_synthetic_group(8, 10_000);
    let outputs = create_synthetic_group(1, 10_000);

    for batch_size in [8, 32, 128].iter() {
        for scaling in [false, true] {
            let mut it = WindowBatchIterator::builder(inputs.clone(), outputs.clone())
                .batch_size(*batch_size)
                .input_length(60)
                .output_length(4)
                .scaling_per_dataset(scaling)
                .seed(Seed::new(42))
                .build()
                .unwrap();
            it.shuffle();

            let name = if scaling { "scaled" } else { "raw" };
            group.bench_with_input(BenchmarkId::new(name, batch_size), batch_size, |b, _| {
                b.iter(|| {
                    if !it.has_next() {
                        it.reset();
                    }
                    black_box(it.next_batch().unwrap())
                });
            });
        }
    }

    group.finish();
}

fn bench_shuffle(c: &mut Criterion) {
    let mut group = c.benchmark_group("shuffle");

    for n_bars in [1_000, 10_000, 100_000].iter() {
        let inputs = create_synthetic_group(1, *n_bars);
        let outputs = create_synthetic_group(1, *n_bars);
        let mut it = WindowBatchIterator::builder(inputs, outputs)
            .seed(Seed::new(42))
            .build()
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(n_bars), n_bars, |b, _| {
            b.iter(|| it.shuffle());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_next_batch, bench_shuffle);
criterion_main!(benches);
