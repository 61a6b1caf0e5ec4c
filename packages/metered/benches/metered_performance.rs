//! Benchmarking the recording and viewing of metrics.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use metered::{Counter, Histogram, Meter, Registry, Snapshot, Timer};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("metered_record");

    let counter = Counter::new();
    group.bench_function("counter_inc", |b| {
        b.iter(|| counter.inc(black_box(1)));
    });

    let meter = Meter::new();
    group.bench_function("meter_mark", |b| {
        b.iter(|| meter.mark(black_box(1)));
    });

    let histogram = Histogram::new();
    group.bench_function("histogram_update", |b| {
        b.iter(|| histogram.update(black_box(42)));
    });

    let timer = Timer::new("milliseconds");
    group.bench_function("timer_update_millis", |b| {
        b.iter(|| timer.update_millis(black_box(Duration::from_micros(1500))));
    });

    let registry = Registry::new();
    group.bench_function("registry_record_counter", |b| {
        b.iter(|| registry.record_counter("bench", black_box("requests"), 1));
    });

    group.finish();

    let mut group = c.benchmark_group("metered_view");

    // Fill the reservoir so that snapshots sort a realistic number of samples.
    for value in 0..2000 {
        histogram.update(value);
    }

    group.bench_function("histogram_snapshot", |b| {
        b.iter(|| black_box(histogram.snapshot()));
    });

    let snapshot = histogram.snapshot();
    group.bench_function("snapshot_view", |b| {
        b.iter(|| black_box(snapshot.view()));
    });

    group.bench_function("snapshot_new_sorted", |b| {
        b.iter(|| black_box(Snapshot::new(snapshot.values().iter().copied())));
    });

    group.bench_function("timer_view", |b| {
        b.iter(|| black_box(timer.view()));
    });

    group.bench_function("registry_view", |b| {
        b.iter(|| black_box(registry.view()));
    });

    group.finish();
}
