use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::ERR_POISONED_LOCK;

/// Source of monotonic timestamps for the time-aware metrics.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait TimeSource: Debug + Send {
    fn now(&self) -> Instant;
}

/// The time source that metrics use to decide how much time has passed.
///
/// Metrics never schedule work on their own. Instead, a [`Meter`][crate::Meter] compares the
/// current time reported by its clock with the time of its last decay step and catches up on
/// any steps it has missed. Injecting a [`ManualClock`] therefore gives tests full control over
/// the passage of time.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use metered::{Clock, ManualClock, Meter};
///
/// let manual = ManualClock::new();
/// let meter = Meter::with_clock(Clock::from(manual.clone()));
///
/// meter.mark(10);
/// manual.advance(Duration::from_secs(5));
///
/// assert!(meter.mean_rate() > 0.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Clock {
    inner: ClockFacade,
}

#[derive(Clone, Debug, Default)]
enum ClockFacade {
    #[default]
    System,

    Manual(ManualClock),

    #[cfg(test)]
    Mock(Arc<Mutex<MockTimeSource>>),
}

impl Clock {
    /// A clock that follows the real monotonic time of the operating system.
    #[must_use]
    pub fn system() -> Self {
        Self {
            inner: ClockFacade::System,
        }
    }

    /// Returns the current time.
    #[must_use]
    pub fn now(&self) -> Instant {
        match &self.inner {
            ClockFacade::System => Instant::now(),
            ClockFacade::Manual(manual) => TimeSource::now(manual),
            #[cfg(test)]
            ClockFacade::Mock(mock) => mock
                .lock()
                .expect("mock time source does not support operation after panic in mock")
                .now(),
        }
    }
}

impl From<ManualClock> for Clock {
    fn from(manual: ManualClock) -> Self {
        Self {
            inner: ClockFacade::Manual(manual),
        }
    }
}

#[cfg(test)]
impl From<MockTimeSource> for Clock {
    fn from(mock: MockTimeSource) -> Self {
        Self {
            inner: ClockFacade::Mock(Arc::new(Mutex::new(mock))),
        }
    }
}

/// A clock whose time only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle while the metric
/// under test holds another (via [`Clock::from`]).
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Creates a manual clock that starts at the current real time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Moves the clock forward by `duration`.
    ///
    /// # Panics
    ///
    /// Panics if the resulting instant cannot be represented by the platform.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().expect(ERR_POISONED_LOCK);
        *now = now
            .checked_add(duration)
            .expect("manual clock advanced beyond the range of the platform clock");
    }

    /// Returns the current time of the manual clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        *self.now.lock().expect(ERR_POISONED_LOCK)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualClock {
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn now(&self) -> Instant {
        Self::now(self)
    }
}
