use std::sync::atomic::{self, AtomicI64};

use serde::Serialize;

/// We only need atomicity of each individual update - a counter has a single field, so there
/// is nothing for a reader to observe out of order.
const COUNTER_ACCESS_ORDERING: atomic::Ordering = atomic::Ordering::Relaxed;

/// An incrementing and decrementing counter.
///
/// Updates are lock-free and may be issued from any number of threads at the same time.
///
/// # Example
///
/// ```
/// use metered::Counter;
///
/// let connections = Counter::new();
///
/// connections.inc_once();
/// connections.inc(4);
/// connections.dec_once();
///
/// assert_eq!(connections.count(), 4);
/// ```
///
/// # Mathematics policy
///
/// Arithmetic wraps around at the `i64` boundaries. Do not stray near them.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    /// Creates a counter with a value of zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter by `n`.
    ///
    /// `n` may be negative, which is equivalent to calling [`dec()`][Self::dec] with `-n`.
    #[inline]
    pub fn inc(&self, n: i64) {
        self.count.fetch_add(n, COUNTER_ACCESS_ORDERING);
    }

    /// Increments the counter by one.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    #[inline]
    pub fn inc_once(&self) {
        self.inc(1);
    }

    /// Decrements the counter by `n`.
    #[inline]
    pub fn dec(&self, n: i64) {
        self.count.fetch_sub(n, COUNTER_ACCESS_ORDERING);
    }

    /// Decrements the counter by one.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    #[inline]
    pub fn dec_once(&self) {
        self.dec(1);
    }

    /// The current value of the counter.
    #[must_use]
    pub fn count(&self) -> i64 {
        self.count.load(COUNTER_ACCESS_ORDERING)
    }

    /// Captures the exportable state of the counter.
    #[must_use]
    pub fn view(&self) -> CounterView {
        CounterView {
            count: self.count(),
        }
    }
}

/// Exportable state of a [`Counter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct CounterView {
    /// The value of the counter when the view was taken.
    pub count: i64,
}
