use std::time::Duration;

use crate::{FIFTEEN_MINUTE_WINDOW, FIVE_MINUTE_WINDOW, ONE_MINUTE_WINDOW, TICK_INTERVAL};

/// An exponentially-weighted moving average of an event rate.
///
/// Events are accumulated via [`update()`][Self::update] and folded into the average each
/// time the average is [ticked][Self::tick]. The decay follows the classic UNIX load average
/// formula, so the presets are equivalent to the 1, 5 and 15 minute load averages when ticked
/// every [`TICK_INTERVAL`].
///
/// This type does not keep time on its own - whoever owns it is responsible for ticking it at
/// the expected cadence. A [`Meter`][crate::Meter] does this lazily, catching up on any missed
/// ticks whenever it is used.
///
/// # Example
///
/// ```
/// use metered::MovingAverage;
///
/// let mut average = MovingAverage::one_minute();
///
/// average.update(10);
/// average.tick();
///
/// // 10 events over a 5 second tick interval.
/// assert!((average.rate() - 2.0).abs() < f64::EPSILON);
/// ```
#[derive(Clone, Debug)]
pub struct MovingAverage {
    alpha: f64,
    tick_interval_secs: f64,

    // Events per second, 0.0 until the first tick.
    rate: f64,
    initialized: bool,

    // Events recorded since the last tick.
    uncounted: u64,
}

impl MovingAverage {
    /// Creates an average equivalent to the UNIX one minute load average,
    /// expecting to be ticked every [`TICK_INTERVAL`].
    #[must_use]
    pub fn one_minute() -> Self {
        Self::with_window(ONE_MINUTE_WINDOW, TICK_INTERVAL)
    }

    /// Creates an average equivalent to the UNIX five minute load average,
    /// expecting to be ticked every [`TICK_INTERVAL`].
    #[must_use]
    pub fn five_minute() -> Self {
        Self::with_window(FIVE_MINUTE_WINDOW, TICK_INTERVAL)
    }

    /// Creates an average equivalent to the UNIX fifteen minute load average,
    /// expecting to be ticked every [`TICK_INTERVAL`].
    #[must_use]
    pub fn fifteen_minute() -> Self {
        Self::with_window(FIFTEEN_MINUTE_WINDOW, TICK_INTERVAL)
    }

    /// Creates an average over an arbitrary window, expecting to be ticked every `tick_interval`.
    ///
    /// The smoothing factor is `1 - exp(-tick_interval / window)`.
    ///
    /// # Panics
    ///
    /// Panics if either duration is zero.
    #[must_use]
    pub fn with_window(window: Duration, tick_interval: Duration) -> Self {
        assert!(!window.is_zero(), "moving average window cannot be zero");
        assert!(
            !tick_interval.is_zero(),
            "moving average tick interval cannot be zero"
        );

        let tick_interval_secs = tick_interval.as_secs_f64();
        let alpha = 1.0 - (-tick_interval_secs / window.as_secs_f64()).exp();

        Self::new(alpha, tick_interval_secs)
    }

    fn new(alpha: f64, tick_interval_secs: f64) -> Self {
        debug_assert!(alpha > 0.0 && alpha <= 1.0, "alpha must be in (0, 1]");

        Self {
            alpha,
            tick_interval_secs,
            rate: 0.0,
            initialized: false,
            uncounted: 0,
        }
    }

    /// Records `n` events that happened since the last tick.
    ///
    /// This never decays the average - that only happens on [`tick()`][Self::tick].
    #[inline]
    pub fn update(&mut self, n: u64) {
        self.uncounted = self.uncounted.wrapping_add(n);
    }

    /// Marks the passage of one tick interval and decays the average accordingly.
    pub fn tick(&mut self) {
        #[expect(
            clippy::cast_precision_loss,
            reason = "event counts within a single tick are far below 2^52"
        )]
        let instant_rate = self.uncounted as f64 / self.tick_interval_secs;
        self.uncounted = 0;

        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }

        self.flush_subnormal();
    }

    /// Marks the passage of `ticks` tick intervals at once.
    ///
    /// Equivalent to calling [`tick()`][Self::tick] `ticks` times: events recorded since the
    /// last tick are folded in by the first of them and the rest decay the average with no
    /// new events. Takes the same time regardless of how many ticks are replayed.
    pub fn tick_idle(&mut self, ticks: u64) {
        let Some(remaining) = ticks.checked_sub(1) else {
            return;
        };

        self.tick();

        if remaining == 0 {
            return;
        }

        #[expect(
            clippy::cast_precision_loss,
            reason = "beyond 2^52 idle ticks the decay factor is zero anyway"
        )]
        let remaining = remaining as f64;

        self.rate *= (1.0 - self.alpha).powf(remaining);
        self.flush_subnormal();
    }

    // Subnormal rates are indistinguishable from zero and make further arithmetic slow.
    fn flush_subnormal(&mut self) {
        if self.rate < f64::MIN_POSITIVE {
            self.rate = 0.0;
        }
    }

    /// The average rate, in events per second.
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// The smoothing factor applied on every tick.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}
