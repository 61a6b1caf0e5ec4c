use serde::Serialize;

use crate::{Error, Result};

/// An immutable, sorted capture of the values held by a [`Reservoir`][crate::Reservoir].
///
/// All statistics degrade to `0.0` when the snapshot is empty. Use [`size()`][Self::size]
/// to tell "no data" apart from "genuinely zero".
///
/// # Example
///
/// ```
/// use metered::Snapshot;
///
/// let snapshot = Snapshot::new([5.0, 1.0, 4.0, 2.0, 3.0]);
///
/// assert_eq!(snapshot.size(), 5);
/// assert_eq!(snapshot.min(), 1.0);
/// assert_eq!(snapshot.median(), 3.0);
/// assert_eq!(snapshot.max(), 5.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    // Ascending by `f64::total_cmp`: NaN with the sign bit set sorts first, any other NaN last.
    values: Box<[f64]>,
}

impl Snapshot {
    /// Creates a snapshot from an arbitrary sequence of observed values.
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let mut values = values.into_iter().collect::<Vec<_>>();
        values.sort_unstable_by(f64::total_cmp);

        Self {
            values: values.into_boxed_slice(),
        }
    }

    /// Returns the value at the given quantile, interpolating linearly between the two closest
    /// samples.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuantile`] if `quantile` is not in `[0, 1]`.
    pub fn value(&self, quantile: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&quantile) {
            return Err(Error::InvalidQuantile { quantile });
        }

        let (Some(&min), Some(&max)) = (self.values.first(), self.values.last()) else {
            return Ok(0.0);
        };

        #[expect(
            clippy::cast_precision_loss,
            reason = "sample counts are bounded by reservoir capacity, far below 2^52"
        )]
        let len = self.values.len() as f64;

        let pos = quantile * (len + 1.0);

        if pos < 1.0 {
            return Ok(min);
        }

        if pos >= len {
            return Ok(max);
        }

        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "pos is in [1, len) so its integer part is a valid index"
        )]
        let upper_index = pos.floor() as usize;

        let lower = self.values.get(upper_index.wrapping_sub(1));
        let upper = self.values.get(upper_index);

        match (lower, upper) {
            (Some(&lower), Some(&upper)) => Ok(pos.fract().mul_add(upper - lower, lower)),
            _ => unreachable!("pos is in [1, len) so both neighbours exist"),
        }
    }

    /// The median of the values.
    #[must_use]
    pub fn median(&self) -> f64 {
        self.known_quantile(0.5)
    }

    /// The value at the 75th percentile.
    #[must_use]
    pub fn p75(&self) -> f64 {
        self.known_quantile(0.75)
    }

    /// The value at the 95th percentile.
    #[must_use]
    pub fn p95(&self) -> f64 {
        self.known_quantile(0.95)
    }

    /// The value at the 98th percentile.
    #[must_use]
    pub fn p98(&self) -> f64 {
        self.known_quantile(0.98)
    }

    /// The value at the 99th percentile.
    #[must_use]
    pub fn p99(&self) -> f64 {
        self.known_quantile(0.99)
    }

    /// The value at the 99.9th percentile.
    #[must_use]
    pub fn p999(&self) -> f64 {
        self.known_quantile(0.999)
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn known_quantile(&self, quantile: f64) -> f64 {
        self.value(quantile)
            .expect("built-in quantiles are constants within [0, 1]")
    }

    /// The arithmetic mean of the values, or `0.0` if there are none.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }

        #[expect(
            clippy::cast_precision_loss,
            reason = "sample counts are bounded by reservoir capacity, far below 2^52"
        )]
        let len = self.values.len() as f64;

        self.values.iter().sum::<f64>() / len
    }

    /// The sample standard deviation of the values, or `0.0` if there are fewer than two.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        if self.values.len() <= 1 {
            return 0.0;
        }

        // Two-pass: mean first, then squared deviations from it.
        let mean = self.mean();

        let sum_of_squares = self
            .values
            .iter()
            .map(|value| {
                let diff = value - mean;
                diff * diff
            })
            .sum::<f64>();

        #[expect(
            clippy::cast_precision_loss,
            reason = "sample counts are bounded by reservoir capacity, far below 2^52"
        )]
        let len = self.values.len() as f64;

        (sum_of_squares / (len - 1.0)).sqrt()
    }

    /// The smallest value, or `0.0` if there are none.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or_default()
    }

    /// The largest value, or `0.0` if there are none.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or_default()
    }

    /// Number of values in the snapshot.
    ///
    /// This may be less than the number of values ever recorded, depending on how many
    /// the reservoir retains.
    #[must_use]
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// The values in the snapshot, in ascending order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Captures the exportable statistics of the snapshot.
    #[must_use]
    pub fn view(&self) -> SnapshotView {
        SnapshotView {
            max: self.max(),
            mean: self.mean(),
            min: self.min(),
            p50: self.median(),
            p75: self.p75(),
            p95: self.p95(),
            p98: self.p98(),
            p99: self.p99(),
            p999: self.p999(),
            stddev: self.std_dev(),
        }
    }
}

/// Exportable distribution statistics of a [`Snapshot`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[non_exhaustive]
pub struct SnapshotView {
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Smallest value.
    pub min: f64,
    /// Median.
    pub p50: f64,
    /// 75th percentile.
    pub p75: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 98th percentile.
    pub p98: f64,
    /// 99th percentile.
    pub p99: f64,
    /// 99.9th percentile.
    pub p999: f64,
    /// Sample standard deviation.
    pub stddev: f64,
}
