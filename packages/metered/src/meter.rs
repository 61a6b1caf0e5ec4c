use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::{Clock, ERR_POISONED_LOCK, METER_RATE_UNITS, MovingAverage, TICK_INTERVAL};

/// A metric that measures the throughput of events.
///
/// Reports the mean rate since creation plus one, five and fifteen minute exponentially-weighted
/// moving average rates, all in events per second.
///
/// # Lazy decay
///
/// The moving averages are meant to be ticked every [`TICK_INTERVAL`], but no background timer
/// exists to do that. Instead, every mark and every rate read first checks how many whole tick
/// intervals have passed since the last tick and replays that many ticks. Idle periods therefore
/// still decay the rates correctly, as long as somebody eventually looks at them.
///
/// # Example
///
/// ```
/// use metered::Meter;
///
/// let requests = Meter::new();
///
/// requests.mark_once();
/// requests.mark(4);
///
/// assert_eq!(requests.count(), 5);
/// ```
#[derive(Debug)]
pub struct Meter {
    clock: Clock,
    start_time: Instant,

    state: Mutex<MeterState>,
}

#[derive(Debug)]
struct MeterState {
    count: u64,
    last_tick: Instant,

    m1: MovingAverage,
    m5: MovingAverage,
    m15: MovingAverage,
}

impl MeterState {
    /// Replays any ticks that should have happened between the last tick and `now`.
    fn tick_if_necessary(&mut self, now: Instant) {
        let age = now.saturating_duration_since(self.last_tick);

        if age <= TICK_INTERVAL {
            return;
        }

        let tick_nanos = TICK_INTERVAL.as_nanos();
        let age_nanos = age.as_nanos();

        // TICK_INTERVAL is a non-zero constant.
        let required_ticks = age_nanos.checked_div(tick_nanos).unwrap_or_default();
        let remainder = age_nanos.checked_rem(tick_nanos).unwrap_or_default();

        // The remainder is below TICK_INTERVAL, so it always fits into a u64 of nanoseconds.
        let remainder = Duration::from_nanos(u64::try_from(remainder).unwrap_or_default());

        // Align to the tick boundary, carrying the partial interval over to the next check.
        self.last_tick = now.checked_sub(remainder).unwrap_or(now);

        let required_ticks = u64::try_from(required_ticks).unwrap_or(u64::MAX);

        self.m1.tick_idle(required_ticks);
        self.m5.tick_idle(required_ticks);
        self.m15.tick_idle(required_ticks);
    }

    fn mark(&mut self, n: u64) {
        self.count = self.count.wrapping_add(n);

        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }
}

impl Meter {
    /// Creates a meter that follows the real system time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::system())
    }

    /// Creates a meter that takes its notion of time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        let start_time = clock.now();

        Self {
            clock,
            start_time,
            state: Mutex::new(MeterState {
                count: 0,
                last_tick: start_time,
                m1: MovingAverage::one_minute(),
                m5: MovingAverage::five_minute(),
                m15: MovingAverage::fifteen_minute(),
            }),
        }
    }

    /// Marks the occurrence of `n` events.
    pub fn mark(&self, n: u64) {
        let now = self.clock.now();

        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
        state.tick_if_necessary(now);
        state.mark(n);
    }

    /// Marks the occurrence of a single event.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    pub fn mark_once(&self) {
        self.mark(1);
    }

    /// Number of events ever marked.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.state.lock().expect(ERR_POISONED_LOCK).count
    }

    /// The one minute exponentially-weighted moving average rate, in events per second.
    #[must_use]
    pub fn one_minute_rate(&self) -> f64 {
        self.with_current_state(|state| state.m1.rate())
    }

    /// The five minute exponentially-weighted moving average rate, in events per second.
    #[must_use]
    pub fn five_minute_rate(&self) -> f64 {
        self.with_current_state(|state| state.m5.rate())
    }

    /// The fifteen minute exponentially-weighted moving average rate, in events per second.
    #[must_use]
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.with_current_state(|state| state.m15.rate())
    }

    /// The mean rate since the meter was created, in events per second.
    ///
    /// Returns `0.0` if no time has passed since the meter was created.
    #[must_use]
    pub fn mean_rate(&self) -> f64 {
        let now = self.clock.now();
        let count = self.count();

        self.mean_rate_at(count, now)
    }

    fn mean_rate_at(&self, count: u64, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.start_time);

        if elapsed.is_zero() {
            return 0.0;
        }

        #[expect(
            clippy::cast_precision_loss,
            reason = "counts above 2^52 lose precision, which is fine for a rate"
        )]
        let count = count as f64;

        count / elapsed.as_secs_f64()
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Brings the moving averages up to date with the clock and then inspects the state.
    fn with_current_state<T>(&self, f: impl FnOnce(&MeterState) -> T) -> T {
        let now = self.clock.now();

        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
        state.tick_if_necessary(now);

        f(&state)
    }

    /// Captures the exportable state of the meter.
    ///
    /// All values in the view are derived from a single reading of the clock.
    #[must_use]
    pub fn view(&self) -> MeterView {
        let now = self.clock.now();

        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
        state.tick_if_necessary(now);

        MeterView {
            count: state.count,
            m1_rate: state.m1.rate(),
            m5_rate: state.m5.rate(),
            m15_rate: state.m15.rate(),
            mean_rate: self.mean_rate_at(state.count, now),
            units: METER_RATE_UNITS,
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

/// Exportable state of a [`Meter`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[non_exhaustive]
pub struct MeterView {
    /// Number of events ever marked.
    pub count: u64,
    /// One minute moving average rate.
    pub m1_rate: f64,
    /// Five minute moving average rate.
    pub m5_rate: f64,
    /// Fifteen minute moving average rate.
    pub m15_rate: f64,
    /// Mean rate since the meter was created.
    pub mean_rate: f64,
    /// Always [`METER_RATE_UNITS`].
    pub units: &'static str,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::float_cmp, reason = "exact values are expected in these tests")]

    use std::thread;

    use mockall::Sequence;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::{ManualClock, MockTimeSource};

    assert_impl_all!(Meter: Send, Sync);

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn manual_meter() -> (Meter, ManualClock) {
        let manual = ManualClock::new();
        let meter = Meter::with_clock(Clock::from(manual.clone()));

        (meter, manual)
    }

    fn one_minute_alpha() -> f64 {
        MovingAverage::one_minute().alpha()
    }

    #[test]
    fn new_meter_is_idle() {
        let (meter, _clock) = manual_meter();

        assert_eq!(meter.count(), 0);
        assert_eq!(meter.one_minute_rate(), 0.0);
        assert_eq!(meter.five_minute_rate(), 0.0);
        assert_eq!(meter.fifteen_minute_rate(), 0.0);
        assert_eq!(meter.mean_rate(), 0.0);
    }

    #[test]
    fn mark_accumulates_count() {
        let (meter, _clock) = manual_meter();

        meter.mark_once();
        meter.mark(9);

        assert_eq!(meter.count(), 10);
    }

    #[test]
    fn rates_stay_zero_within_first_interval() {
        let (meter, clock) = manual_meter();

        meter.mark(10);
        clock.advance(TICK_INTERVAL);

        // Exactly one interval is not "more than" one interval, so no tick yet.
        assert_eq!(meter.one_minute_rate(), 0.0);
    }

    #[test]
    fn first_tick_reports_instant_rate() {
        let (meter, clock) = manual_meter();

        meter.mark(10);
        clock.advance(TICK_INTERVAL + Duration::from_millis(1));

        assert_close(meter.one_minute_rate(), 2.0);
        assert_close(meter.five_minute_rate(), 2.0);
        assert_close(meter.fifteen_minute_rate(), 2.0);
    }

    #[test]
    fn idle_reads_replay_all_missed_ticks() {
        let (meter, clock) = manual_meter();

        meter.mark(10);

        // 1 ms past the boundary so the first read ticks exactly once.
        clock.advance(TICK_INTERVAL + Duration::from_millis(1));
        assert_close(meter.one_minute_rate(), 2.0);

        // Four more intervals pass with no intervening calls at all.
        clock.advance(TICK_INTERVAL * 4);

        let expected = 2.0 * (1.0 - one_minute_alpha()).powi(4);
        assert_close(meter.one_minute_rate(), expected);
    }

    #[test]
    fn long_gap_is_caught_up_in_one_read() {
        let (meter, clock) = manual_meter();

        meter.mark(10);

        // 13 whole intervals plus a bit: first tick seeds the rate, 12 more decay it.
        clock.advance(TICK_INTERVAL * 13 + Duration::from_secs(1));

        let expected = 2.0 * (1.0 - one_minute_alpha()).powi(12);
        assert_close(meter.one_minute_rate(), expected);

        // A minute of decay at the one minute window leaves roughly 1/e.
        assert_close(expected, 2.0 * (-1.0_f64).exp());
    }

    #[test]
    fn partial_interval_carries_over() {
        let (meter, clock) = manual_meter();

        meter.mark(5);

        // 7.5 seconds: one tick, 2.5 seconds carried over.
        clock.advance(Duration::from_millis(7_500));
        assert_close(meter.one_minute_rate(), 1.0);

        // Another 2.6 seconds crosses the next boundary (5.1 s since the aligned tick).
        clock.advance(Duration::from_millis(2_600));
        assert_close(meter.one_minute_rate(), 1.0 - one_minute_alpha());
    }

    #[test]
    fn marks_after_catch_up_land_in_the_open_interval() {
        let (meter, clock) = manual_meter();

        meter.mark(5);
        clock.advance(TICK_INTERVAL * 2 + Duration::from_millis(1));

        // This mark first ticks twice (seed with 1.0, then decay) and only then accrues.
        meter.mark(50);

        let decayed = 1.0 - one_minute_alpha();
        assert_close(meter.one_minute_rate(), decayed);

        clock.advance(TICK_INTERVAL);
        assert_close(
            meter.one_minute_rate(),
            one_minute_alpha().mul_add(10.0 - decayed, decayed),
        );
    }

    #[test]
    fn mean_rate_uses_elapsed_time() {
        let (meter, clock) = manual_meter();

        meter.mark(30);
        clock.advance(Duration::from_secs(10));

        assert_close(meter.mean_rate(), 3.0);
    }

    #[test]
    fn view_contains_all_rates() {
        let (meter, clock) = manual_meter();

        meter.mark(10);
        clock.advance(Duration::from_secs(6));

        let view = meter.view();

        assert_eq!(view.count, 10);
        assert_close(view.m1_rate, 2.0);
        assert_close(view.m5_rate, 2.0);
        assert_close(view.m15_rate, 2.0);
        assert_close(view.mean_rate, 10.0 / 6.0);
        assert_eq!(view.units, "events/second");
    }

    #[test]
    fn view_serializes_with_expected_keys() {
        let (meter, _clock) = manual_meter();

        let json = serde_json::to_value(meter.view()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "count": 0,
                "m1_rate": 0.0,
                "m5_rate": 0.0,
                "m15_rate": 0.0,
                "mean_rate": 0.0,
                "units": "events/second",
            })
        );
    }

    #[test]
    fn years_of_idleness_decay_rates_to_zero() {
        let (meter, clock) = manual_meter();

        meter.mark(1);
        clock.advance(Duration::from_secs(5 * 365 * 24 * 60 * 60));

        let view = meter.view();

        assert_eq!(view.count, 1);
        assert_eq!(view.m1_rate, 0.0);
        assert_eq!(view.m5_rate, 0.0);
        assert_eq!(view.m15_rate, 0.0);
    }

    #[test]
    fn catch_up_after_long_gap_matches_tick_by_tick_replay() {
        let (meter, clock) = manual_meter();

        let mut reference = MovingAverage::five_minute();

        meter.mark(40);
        reference.update(40);

        clock.advance(TICK_INTERVAL * 250 + Duration::from_millis(1));

        for _ in 0..250 {
            reference.tick();
        }

        assert_close(meter.five_minute_rate(), reference.rate());
    }

    #[test]
    fn view_reads_clock_exactly_once() {
        let start = Instant::now();
        let later = start.checked_add(Duration::from_secs(6)).unwrap();

        let mut time_source = MockTimeSource::new();
        let mut seq = Sequence::new();

        // Construction, then the mark.
        time_source
            .expect_now()
            .times(2)
            .in_sequence(&mut seq)
            .return_const(start);

        // The view. A second reading would exceed the expectation and panic.
        time_source
            .expect_now()
            .once()
            .in_sequence(&mut seq)
            .return_const(later);

        let meter = Meter::with_clock(Clock::from(time_source));

        meter.mark(10);

        let view = meter.view();

        assert_eq!(view.count, 10);
        assert_close(view.m1_rate, 2.0);
        assert_close(view.mean_rate, 10.0 / 6.0);
    }

    #[test]
    fn rate_getters_catch_up_from_their_own_clock_reading() {
        let start = Instant::now();
        let after_one_tick = start.checked_add(Duration::from_secs(6)).unwrap();
        let after_two_ticks = start.checked_add(Duration::from_secs(11)).unwrap();

        let mut time_source = MockTimeSource::new();
        let mut seq = Sequence::new();

        time_source
            .expect_now()
            .times(2)
            .in_sequence(&mut seq)
            .return_const(start);

        time_source
            .expect_now()
            .once()
            .in_sequence(&mut seq)
            .return_const(after_one_tick);

        time_source
            .expect_now()
            .once()
            .in_sequence(&mut seq)
            .return_const(after_two_ticks);

        let meter = Meter::with_clock(Clock::from(time_source));

        meter.mark(10);

        assert_close(meter.one_minute_rate(), 2.0);
        assert_close(meter.one_minute_rate(), 2.0 * (1.0 - one_minute_alpha()));
    }

    #[test]
    fn concurrent_marks_are_not_lost() {
        let (meter, clock) = manual_meter();

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        meter.mark_once();
                    }
                });
            }

            s.spawn(|| {
                for _ in 0..100 {
                    clock.advance(Duration::from_millis(100));
                    drop(meter.view());
                }
            });
        });

        assert_eq!(meter.count(), 4000);
    }
}
