//! Example that demonstrates the usage shown in the README.md file.
//!
//! Run with `RUST_LOG=metered=debug` to see metrics being registered.

use std::thread;
use std::time::Duration;

use metered::Registry;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Metered README Example ===");

    let registry = Registry::new();

    for item_count in [1, 3, 2, 1, 5] {
        registry.record_counter("orders", "received", 1);
        registry.record_meter("orders", "received_rate", 1);
        registry.record_histogram("orders", "item_count", item_count);

        let _span = registry.timing("orders", "process");
        thread::sleep(Duration::from_millis(10));
    }

    // Explicitly measured durations can be recorded directly.
    registry.record_timer("orders", "charge_card", 35.5);

    // Asking for the same timer with different units keeps the original units and logs a warning.
    let _timer = registry.timer("orders", "charge_card", "seconds");

    let view = registry.view();

    println!();
    println!("{view}");

    match serde_json::to_string_pretty(&view) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize metrics: {e}"),
    }
}
