use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use num_traits::AsPrimitive;
use serde::Serialize;

use crate::{
    Clock, ERR_POISONED_LOCK, Histogram, Meter, Snapshot, SnapshotView, TIMER_RATE_UNITS,
};

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// A metric that aggregates durations, providing both their distribution and the rate at which
/// they are recorded.
///
/// The duration units are a free-form label chosen by the caller (e.g. `"milliseconds"`).
/// They are reported in the [view][Self::view] but never interpreted, except by the helpers
/// that measure elapsed time, which always record milliseconds.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use metered::Timer;
///
/// let query_time = Timer::new("milliseconds");
///
/// query_time.update(12.5);
/// query_time.update_millis(Duration::from_millis(40));
///
/// // Negative durations are measurement noise and are ignored.
/// query_time.update(-3);
///
/// assert_eq!(query_time.count(), 2);
/// assert_eq!(query_time.snapshot().max(), 40.0);
/// ```
#[derive(Debug)]
pub struct Timer {
    histogram: Histogram,
    meter: Meter,
    duration_units: Cow<'static, str>,

    // Held across updates and views so that the histogram and meter halves always describe
    // the same set of recorded durations. Always acquired before the children's own locks.
    sequence: Mutex<()>,
}

impl Timer {
    /// Creates a timer that follows the real system time.
    #[must_use]
    pub fn new(duration_units: impl Into<Cow<'static, str>>) -> Self {
        Self::with_clock(duration_units, Clock::system())
    }

    /// Creates a timer that takes its notion of time from `clock`.
    #[must_use]
    pub fn with_clock(duration_units: impl Into<Cow<'static, str>>, clock: Clock) -> Self {
        Self::with_parts(duration_units, Histogram::new(), clock)
    }

    pub(crate) fn with_parts(
        duration_units: impl Into<Cow<'static, str>>,
        histogram: Histogram,
        clock: Clock,
    ) -> Self {
        Self {
            histogram,
            meter: Meter::with_clock(clock),
            duration_units: duration_units.into(),
            sequence: Mutex::new(()),
        }
    }

    /// Records a duration, expressed in the timer's duration units.
    ///
    /// Negative (and NaN) durations are silently discarded.
    pub fn update(&self, duration: impl AsPrimitive<f64>) {
        let duration: f64 = duration.as_();

        if duration.is_nan() || duration < 0.0 {
            tracing::trace!(duration, "discarding invalid timer duration");
            return;
        }

        let _sequence = self.sequence.lock().expect(ERR_POISONED_LOCK);

        self.histogram.update(duration);
        self.meter.mark_once();
    }

    /// Records a duration in (fractional) milliseconds.
    pub fn update_millis(&self, duration: Duration) {
        #[expect(
            clippy::cast_precision_loss,
            reason = "durations above 2^52 nanoseconds (~52 days) lose sub-millisecond precision"
        )]
        let nanos = duration.as_nanos() as f64;

        self.update(nanos / NANOS_PER_MILLI);
    }

    /// Measures how long `f` takes and records the duration in milliseconds.
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = self.clock().now();

        let result = f();

        self.update_millis(self.clock().now().saturating_duration_since(start));

        result
    }

    /// Starts measuring a span of code, recording its duration in milliseconds when the
    /// returned guard is dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use metered::Timer;
    ///
    /// let timer = Arc::new(Timer::new("milliseconds"));
    ///
    /// {
    ///     let _span = timer.start();
    ///     // Work happens here.
    /// }
    ///
    /// assert_eq!(timer.count(), 1);
    /// ```
    pub fn start(self: &Arc<Self>) -> TimerSpan {
        TimerSpan {
            timer: Arc::clone(self),
            start: self.clock().now(),
        }
    }

    fn clock(&self) -> &Clock {
        self.meter.clock()
    }

    /// Number of durations recorded.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    /// Captures the durations currently retained by the timer's reservoir.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.histogram.snapshot()
    }

    /// The one minute moving average rate of recorded durations, in calls per second.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    #[must_use]
    pub fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    /// The five minute moving average rate of recorded durations, in calls per second.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    #[must_use]
    pub fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    /// The fifteen minute moving average rate of recorded durations, in calls per second.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    #[must_use]
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }

    /// The mean rate of recorded durations since the timer was created, in calls per second.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    #[must_use]
    pub fn mean_rate(&self) -> f64 {
        self.meter.mean_rate()
    }

    /// The label describing the units of recorded durations.
    #[must_use]
    pub fn duration_units(&self) -> &str {
        &self.duration_units
    }

    /// Captures the exportable state of the timer.
    #[must_use]
    pub fn view(&self) -> TimerView {
        let _sequence = self.sequence.lock().expect(ERR_POISONED_LOCK);

        let (count, snapshot) = self.histogram.count_and_snapshot();
        let rates = self.meter.view();

        TimerView {
            count,
            statistics: snapshot.view(),
            m1_rate: rates.m1_rate,
            m5_rate: rates.m5_rate,
            m15_rate: rates.m15_rate,
            mean_rate: rates.mean_rate,
            duration_units: self.duration_units.to_string(),
            rate_units: TIMER_RATE_UNITS,
        }
    }
}

/// Measures the time between its creation and drop, recording it into a [`Timer`]
/// in milliseconds.
#[derive(Debug)]
#[must_use = "Measurements are taken between creation and drop"]
pub struct TimerSpan {
    timer: Arc<Timer>,
    start: Instant,
}

impl Drop for TimerSpan {
    fn drop(&mut self) {
        let elapsed = self
            .timer
            .clock()
            .now()
            .saturating_duration_since(self.start);

        self.timer.update_millis(elapsed);
    }
}

/// Exportable state of a [`Timer`].
///
/// Serializes as a flat mapping: `count`, every field of [`SnapshotView`], the four rates,
/// `duration_units` and `rate_units`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[non_exhaustive]
pub struct TimerView {
    /// Number of durations recorded.
    pub count: u64,

    /// Distribution statistics of the retained durations.
    #[serde(flatten)]
    pub statistics: SnapshotView,

    /// One minute moving average rate.
    pub m1_rate: f64,
    /// Five minute moving average rate.
    pub m5_rate: f64,
    /// Fifteen minute moving average rate.
    pub m15_rate: f64,
    /// Mean rate since the timer was created.
    pub mean_rate: f64,

    /// The caller-supplied label describing the units of recorded durations.
    pub duration_units: String,
    /// Always [`TIMER_RATE_UNITS`].
    pub rate_units: &'static str,
}
