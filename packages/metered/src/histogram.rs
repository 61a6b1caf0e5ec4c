use std::num::NonZero;
use std::sync::Mutex;

use num_traits::AsPrimitive;
use serde::Serialize;

use crate::{ERR_POISONED_LOCK, Reservoir, SlidingWindowReservoir, Snapshot, SnapshotView};

/// A metric that tracks the distribution of a value.
///
/// Every recorded value counts towards the all-time [`count()`][Self::count], while only the
/// values retained by the backing [`Reservoir`] contribute to the [snapshot][Self::snapshot].
///
/// # Example
///
/// ```
/// use metered::Histogram;
///
/// let queue_length = Histogram::new();
///
/// queue_length.update(3);
/// queue_length.update(7_u32);
/// queue_length.update(5.5);
///
/// assert_eq!(queue_length.count(), 3);
/// assert_eq!(queue_length.snapshot().max(), 7.0);
/// ```
#[derive(Debug)]
pub struct Histogram<R = SlidingWindowReservoir>
where
    R: Reservoir,
{
    // The count and the reservoir are always read and written together so that a view
    // never mixes a count with a sample set from a different moment.
    state: Mutex<HistogramState<R>>,
}

#[derive(Debug)]
struct HistogramState<R> {
    count: u64,
    reservoir: R,
}

impl Histogram<SlidingWindowReservoir> {
    /// Creates a histogram backed by a [`SlidingWindowReservoir`] of the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_reservoir(SlidingWindowReservoir::new())
    }

    /// Creates a histogram backed by a [`SlidingWindowReservoir`] of the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: NonZero<usize>) -> Self {
        Self::with_reservoir(SlidingWindowReservoir::with_capacity(capacity))
    }
}

impl Default for Histogram<SlidingWindowReservoir> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Histogram<R>
where
    R: Reservoir,
{
    /// Creates a histogram backed by a custom reservoir.
    #[must_use]
    pub fn with_reservoir(reservoir: R) -> Self {
        Self {
            state: Mutex::new(HistogramState {
                count: 0,
                reservoir,
            }),
        }
    }

    /// Records a value.
    pub fn update(&self, value: impl AsPrimitive<f64>) {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        state.count = state.count.wrapping_add(1);
        state.reservoir.update(value.as_());
    }

    /// Number of values ever recorded, independent of how many the reservoir retains.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.state.lock().expect(ERR_POISONED_LOCK).count
    }

    /// Captures the values currently retained by the reservoir.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state
            .lock()
            .expect(ERR_POISONED_LOCK)
            .reservoir
            .snapshot()
    }

    /// Captures the all-time count together with a snapshot taken at the same moment.
    #[must_use]
    pub(crate) fn count_and_snapshot(&self) -> (u64, Snapshot) {
        let state = self.state.lock().expect(ERR_POISONED_LOCK);

        (state.count, state.reservoir.snapshot())
    }

    /// Captures the exportable state of the histogram.
    #[must_use]
    pub fn view(&self) -> HistogramView {
        let (count, snapshot) = self.count_and_snapshot();

        HistogramView {
            count,
            statistics: snapshot.view(),
        }
    }
}

/// Exportable state of a [`Histogram`].
///
/// Serializes as a flat mapping of `count` plus every field of [`SnapshotView`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[non_exhaustive]
pub struct HistogramView {
    /// Number of values ever recorded.
    pub count: u64,

    /// Distribution statistics of the retained values.
    #[serde(flatten)]
    pub statistics: SnapshotView,
}
