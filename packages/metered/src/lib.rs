#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! In-process metrics: counters, meters, histograms and timers.
//!
//! The building blocks are:
//!
//! * [`Counter`] - a signed value that is incremented and decremented.
//! * [`Meter`] - counts events and reports how fast they arrive, both as a lifetime mean
//!   and as 1, 5 and 15 minute exponentially weighted moving averages.
//! * [`Histogram`] - tracks the distribution of a value via a bounded [`Reservoir`] of samples,
//!   summarized as a [`Snapshot`] with percentiles, mean and standard deviation.
//! * [`Timer`] - a histogram of durations combined with a meter of how often they are recorded.
//!
//! Every metric is safe to share between threads and can produce a serializable view of
//! its state for export.
//!
//! # Using metrics directly
//!
//! ```
//! use std::time::Duration;
//!
//! use metered::{Counter, Histogram, Meter, Timer};
//!
//! let active_connections = Counter::new();
//! active_connections.inc_once();
//!
//! let requests = Meter::new();
//! requests.mark(3);
//!
//! let payload_bytes = Histogram::new();
//! payload_bytes.update(512);
//! payload_bytes.update(2048);
//!
//! let query_time = Timer::new("milliseconds");
//! query_time.update_millis(Duration::from_millis(15));
//!
//! assert_eq!(active_connections.count(), 1);
//! assert_eq!(requests.count(), 3);
//! assert_eq!(payload_bytes.snapshot().median(), 1280.0);
//! assert_eq!(query_time.count(), 1);
//! ```
//!
//! # Using a registry
//!
//! A [`Registry`] creates metrics on first use, keyed by module and name, and captures
//! all of them in one [`RegistryView`]:
//!
//! ```
//! use metered::Registry;
//!
//! let registry = Registry::new();
//!
//! registry.record_counter("orders", "placed", 1);
//!
//! {
//!     let _span = registry.timing("orders", "validate");
//!     // Validation happens here.
//! }
//!
//! let view = registry.view();
//! assert_eq!(view.counters["orders.placed"].count, 1);
//!
//! let json = serde_json::to_string(&view).unwrap();
//! assert!(json.contains("orders.validate"));
//! ```
//!
//! # Rates and time
//!
//! Moving averages are updated lazily: no background thread exists. Whenever a meter is touched,
//! it first replays every [`TICK_INTERVAL`] that has fully elapsed since it was last touched.
//! Rates therefore stay correct after arbitrarily long idle periods.
//!
//! Time is read from a [`Clock`], which follows the monotonic system clock by default.
//! A [`ManualClock`] can be substituted to control time explicitly.

mod clock;
mod constants;
mod counter;
mod error;
mod ewma;
mod histogram;
mod meter;
mod registry;
mod reservoir;
mod snapshot;
mod timer;

pub use clock::*;
pub use constants::*;
pub use counter::*;
pub use error::*;
pub use ewma::*;
pub use histogram::*;
pub use meter::*;
pub use registry::*;
pub use reservoir::*;
pub use snapshot::*;
pub use timer::*;
