use std::collections::VecDeque;
use std::fmt::Debug;
use std::num::NonZero;

use crate::{DEFAULT_RESERVOIR_CAPACITY, Snapshot};

/// A bounded store of sampled values that approximates the distribution of an unbounded stream.
///
/// The retention policy belongs entirely to the implementation. A [`Histogram`][crate::Histogram]
/// owns its reservoir exclusively and serializes all access to it, so implementations need no
/// internal synchronization of their own.
pub trait Reservoir: Debug + Send {
    /// Offers a newly observed value to the reservoir.
    fn update(&mut self, value: f64);

    /// Captures the values currently retained by the reservoir.
    fn snapshot(&self) -> Snapshot;
}

/// A reservoir that retains the most recently recorded values, up to a fixed capacity.
///
/// Once full, every new value evicts the oldest one.
///
/// # Example
///
/// ```
/// use std::num::NonZero;
///
/// use metered::{Reservoir, SlidingWindowReservoir};
///
/// let mut reservoir = SlidingWindowReservoir::with_capacity(NonZero::new(2).unwrap());
///
/// reservoir.update(1.0);
/// reservoir.update(2.0);
/// reservoir.update(3.0);
///
/// assert_eq!(reservoir.snapshot().values(), &[2.0, 3.0]);
/// ```
#[derive(Debug)]
pub struct SlidingWindowReservoir {
    // Oldest value at the front.
    values: VecDeque<f64>,
    capacity: NonZero<usize>,
}

impl SlidingWindowReservoir {
    /// Creates a reservoir that retains [`DEFAULT_RESERVOIR_CAPACITY`] values.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RESERVOIR_CAPACITY)
    }

    /// Creates a reservoir that retains up to `capacity` values.
    #[must_use]
    pub fn with_capacity(capacity: NonZero<usize>) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.get()),
            capacity,
        }
    }

    /// Maximum number of values retained.
    #[must_use]
    pub fn capacity(&self) -> NonZero<usize> {
        self.capacity
    }
}

impl Default for SlidingWindowReservoir {
    fn default() -> Self {
        Self::new()
    }
}

impl Reservoir for SlidingWindowReservoir {
    fn update(&mut self, value: f64) {
        if self.values.len() == self.capacity.get() {
            self.values.pop_front();
        }

        self.values.push_back(value);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.values.iter().copied())
    }
}
