use std::num::NonZero;
use std::time::Duration;

// A poisoned lock means the process is in an unrecoverable/unsafe state and must exit (we panic).
pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - metric state \
    can no longer be trusted to be internally consistent";

/// How often the moving averages owned by a [`Meter`][crate::Meter] are (lazily) ticked.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

pub(crate) const ONE_MINUTE_WINDOW: Duration = Duration::from_secs(60);
pub(crate) const FIVE_MINUTE_WINDOW: Duration = Duration::from_secs(5 * 60);
pub(crate) const FIFTEEN_MINUTE_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Number of samples retained by a default [`SlidingWindowReservoir`][crate::SlidingWindowReservoir].
///
/// 1028 samples offer a 99.9% confidence level with a 5% margin of error,
/// assuming a normal distribution.
pub const DEFAULT_RESERVOIR_CAPACITY: NonZero<usize> = NonZero::new(1028).unwrap();

/// Unit label reported by every [`MeterView`][crate::MeterView].
pub const METER_RATE_UNITS: &str = "events/second";

/// Rate unit label reported by every [`TimerView`][crate::TimerView].
pub const TIMER_RATE_UNITS: &str = "calls/second";

/// Duration unit label used by the millisecond-oriented timer helpers.
pub const MILLISECONDS: &str = "milliseconds";
