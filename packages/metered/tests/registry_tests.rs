//! Integration tests for `metered` that exercise the public API end to end
//! through a shared [`Registry`].

#![allow(clippy::float_cmp, reason = "exact values are expected in these tests")]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use metered::{Clock, ManualClock, MILLISECONDS, Registry, TICK_INTERVAL};

fn manual_registry() -> (Registry, ManualClock) {
    let clock = ManualClock::new();
    let registry = Registry::builder()
        .clock(Clock::from(clock.clone()))
        .build();

    (registry, clock)
}

#[test]
fn full_view_after_mixed_activity() {
    let (registry, clock) = manual_registry();

    registry.record_counter("jobs", "queued", 10);
    registry.record_counter("jobs", "queued", -4);

    for size in [1, 2, 3, 4, 5] {
        registry.record_histogram("jobs", "batch_size", size);
    }

    registry.record_meter("jobs", "completed", 25);

    {
        let _span = registry.timing("jobs", "process");
        clock.advance(Duration::from_millis(250));
    }

    clock.advance(TICK_INTERVAL + Duration::from_millis(1));

    let view = registry.view();

    assert_eq!(view.counters["jobs.queued"].count, 6);

    let batch_size = &view.histograms["jobs.batch_size"];
    assert_eq!(batch_size.count, 5);
    assert_eq!(batch_size.statistics.p50, 3.0);
    assert_eq!(batch_size.statistics.min, 1.0);
    assert_eq!(batch_size.statistics.max, 5.0);

    let completed = &view.meters["jobs.completed"];
    assert_eq!(completed.count, 25);
    assert!((completed.m1_rate - 5.0).abs() < 1e-9);
    assert!(completed.mean_rate > 0.0);

    let process = &view.timers["jobs.process"];
    assert_eq!(process.count, 1);
    assert_eq!(process.statistics.max, 250.0);
    assert_eq!(process.duration_units, MILLISECONDS);
    assert_eq!(process.rate_units, "calls/second");
}

#[test]
fn metrics_handed_out_stay_live() {
    let registry = Registry::new();

    let counter = registry.counter("cache", "hits");
    counter.inc(3);

    registry.record_counter("cache", "hits", 2);

    assert_eq!(counter.count(), 5);
    assert_eq!(registry.view().counters["cache.hits"].count, 5);
}

#[test]
fn concurrent_recording_across_threads() {
    const THREADS: u64 = 8;
    const ITERATIONS: u64 = 1000;

    let registry = Arc::new(Registry::new());

    let handles = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);

            thread::spawn(move || {
                for i in 0..ITERATIONS {
                    registry.record_counter("load", "requests", 1);
                    registry.record_meter("load", "events", 1);
                    registry.record_timer("load", "latency", i);
                }
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }

    let view = registry.view();

    assert_eq!(
        view.counters["load.requests"].count,
        i64::try_from(THREADS * ITERATIONS).unwrap()
    );
    assert_eq!(view.meters["load.events"].count, THREADS * ITERATIONS);
    assert_eq!(view.timers["load.latency"].count, THREADS * ITERATIONS);
}

#[test]
fn view_serializes_to_json() {
    let (registry, _clock) = manual_registry();

    registry.record_histogram("net", "packet_size", 1500);
    registry.record_timer("net", "rtt", 20);

    let json: serde_json::Value = serde_json::to_value(registry.view()).unwrap();

    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["histograms"]["net.packet_size"]["count"], 1);
    assert_eq!(json["histograms"]["net.packet_size"]["max"], 1500.0);
    assert_eq!(json["timers"]["net.rtt"]["duration_units"], "milliseconds");
    assert_eq!(json["timers"]["net.rtt"]["p999"], 20.0);
}

#[test]
fn idle_meter_decays_between_views() {
    let (registry, clock) = manual_registry();

    registry.record_meter("api", "calls", 60);
    clock.advance(TICK_INTERVAL + Duration::from_millis(1));

    let first = registry.view().meters["api.calls"].m1_rate;

    clock.advance(Duration::from_secs(60));

    let second = registry.view().meters["api.calls"].m1_rate;

    assert!(first > 0.0);
    assert!(second < first);
    assert!(second > 0.0);
}
