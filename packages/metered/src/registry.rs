use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::num::NonZero;
use std::sync::{Arc, Mutex};

use foldhash::{HashMap, HashMapExt};
use num_traits::AsPrimitive;
use serde::Serialize;

use crate::{
    Clock, Counter, CounterView, DEFAULT_RESERVOIR_CAPACITY, ERR_POISONED_LOCK, Histogram,
    HistogramView, MILLISECONDS, Meter, MeterView, Timer, TimerSpan, TimerView,
};

/// Identifies a metric within a [`Registry`]: the module that owns it and its name.
type MetricKey = (Cow<'static, str>, Cow<'static, str>);

type MetricMap<M> = Mutex<HashMap<MetricKey, Arc<M>>>;

/// A named collection of metrics, created on first use.
///
/// Metrics are keyed by the module that records them plus a name, and are reported under
/// `"{module}.{name}"`. Asking for the same key twice returns the same metric, so callers can
/// either hold on to the returned `Arc` or look the metric up every time.
///
/// There is no process-wide registry - create one and pass it to whoever needs it.
///
/// # Example
///
/// ```
/// use metered::Registry;
///
/// let registry = Registry::new();
///
/// registry.record_counter("billing", "invoices_sent", 1);
/// registry.record_meter("billing", "payments", 3);
/// registry.record_timer("billing", "charge_card", 120.5);
///
/// {
///     let _span = registry.timing("billing", "render_invoice");
///     // Work happens here.
/// }
///
/// let view = registry.view();
/// assert_eq!(view.counters["billing.invoices_sent"].count, 1);
/// assert_eq!(view.timers["billing.render_invoice"].count, 1);
///
/// println!("{view}");
/// ```
#[derive(Debug)]
pub struct Registry {
    clock: Clock,
    reservoir_capacity: NonZero<usize>,

    counters: MetricMap<Counter>,
    histograms: MetricMap<Histogram>,
    meters: MetricMap<Meter>,
    timers: MetricMap<Timer>,
}

impl Registry {
    /// Creates an empty registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for a registry with custom configuration.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Gets replaced with itself by different name, bad mutation.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Returns the counter registered under the given key, creating it if necessary.
    pub fn counter(
        &self,
        module: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> Arc<Counter> {
        get_or_create(&self.counters, "counter", module, name, Counter::new)
    }

    /// Returns the histogram registered under the given key, creating it if necessary.
    pub fn histogram(
        &self,
        module: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> Arc<Histogram> {
        get_or_create(&self.histograms, "histogram", module, name, || {
            Histogram::with_capacity(self.reservoir_capacity)
        })
    }

    /// Returns the meter registered under the given key, creating it if necessary.
    pub fn meter(
        &self,
        module: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> Arc<Meter> {
        get_or_create(&self.meters, "meter", module, name, || {
            Meter::with_clock(self.clock.clone())
        })
    }

    /// Returns the timer registered under the given key, creating it if necessary.
    ///
    /// The duration units only apply when the timer is created. If the timer already exists
    /// with different units, the existing timer is returned unchanged.
    pub fn timer(
        &self,
        module: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        duration_units: impl Into<Cow<'static, str>>,
    ) -> Arc<Timer> {
        let duration_units = duration_units.into();

        let timer = get_or_create(&self.timers, "timer", module, name, || {
            Timer::with_parts(
                duration_units.clone(),
                Histogram::with_capacity(self.reservoir_capacity),
                self.clock.clone(),
            )
        });

        if timer.duration_units() != duration_units {
            tracing::warn!(
                existing = timer.duration_units(),
                requested = %duration_units,
                "timer already registered with different duration units, keeping existing units"
            );
        }

        timer
    }

    /// Increments the named counter by `n`.
    pub fn record_counter(
        &self,
        module: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        n: i64,
    ) {
        self.counter(module, name).inc(n);
    }

    /// Records a value in the named histogram.
    pub fn record_histogram(
        &self,
        module: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        value: impl AsPrimitive<f64>,
    ) {
        self.histogram(module, name).update(value);
    }

    /// Marks `n` events on the named meter.
    pub fn record_meter(
        &self,
        module: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        n: u64,
    ) {
        self.meter(module, name).mark(n);
    }

    /// Records a duration in milliseconds on the named timer.
    pub fn record_timer(
        &self,
        module: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        delta_millis: impl AsPrimitive<f64>,
    ) {
        self.timer(module, name, MILLISECONDS).update(delta_millis);
    }

    /// Measures the time until the returned guard is dropped and records it in milliseconds
    /// on the named timer.
    pub fn timing(
        &self,
        module: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> TimerSpan {
        self.timer(module, name, MILLISECONDS).start()
    }

    /// Captures the exportable state of every registered metric.
    #[must_use]
    pub fn view(&self) -> RegistryView {
        RegistryView {
            version: env!("CARGO_PKG_VERSION"),
            counters: view_all(&self.counters, Counter::view),
            histograms: view_all(&self.histograms, Histogram::view),
            meters: view_all(&self.meters, Meter::view),
            timers: view_all(&self.timers, Timer::view),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn get_or_create<M>(
    metrics: &MetricMap<M>,
    kind: &'static str,
    module: impl Into<Cow<'static, str>>,
    name: impl Into<Cow<'static, str>>,
    create: impl FnOnce() -> M,
) -> Arc<M> {
    let key = (module.into(), name.into());

    let mut metrics = metrics.lock().expect(ERR_POISONED_LOCK);

    Arc::clone(metrics.entry(key).or_insert_with_key(|(module, name)| {
        tracing::debug!(kind, %module, %name, "registering metric");
        Arc::new(create())
    }))
}

fn view_all<M, V>(metrics: &MetricMap<M>, view: impl Fn(&M) -> V) -> BTreeMap<String, V> {
    // Registry lock is released before any metric lock is taken.
    let metrics = metrics
        .lock()
        .expect(ERR_POISONED_LOCK)
        .iter()
        .map(|((module, name), metric)| (format!("{module}.{name}"), Arc::clone(metric)))
        .collect::<Vec<_>>();

    metrics
        .into_iter()
        .map(|(name, metric)| (name, view(&metric)))
        .collect()
}

/// Creates instances of [`Registry`].
///
/// Use `Registry::builder()` to create a new instance of this builder.
#[derive(Debug)]
pub struct RegistryBuilder {
    clock: Clock,
    reservoir_capacity: NonZero<usize>,
}

impl RegistryBuilder {
    fn new() -> Self {
        Self {
            clock: Clock::system(),
            reservoir_capacity: DEFAULT_RESERVOIR_CAPACITY,
        }
    }

    /// Sets the clock used by every time-aware metric the registry creates.
    ///
    /// Defaults to [`Clock::system()`].
    ///
    /// # Example
    ///
    /// ```
    /// use metered::{Clock, ManualClock, Registry};
    ///
    /// let clock = ManualClock::new();
    ///
    /// let registry = Registry::builder()
    ///     .clock(Clock::from(clock.clone()))
    ///     .build();
    /// ```
    #[must_use]
    pub fn clock(self, clock: Clock) -> Self {
        Self { clock, ..self }
    }

    /// Sets how many samples each histogram and timer created by the registry retains.
    ///
    /// Defaults to [`DEFAULT_RESERVOIR_CAPACITY`].
    #[must_use]
    pub fn reservoir_capacity(self, reservoir_capacity: NonZero<usize>) -> Self {
        Self {
            reservoir_capacity,
            ..self
        }
    }

    /// Builds the registry.
    #[must_use]
    pub fn build(self) -> Registry {
        Registry {
            clock: self.clock,
            reservoir_capacity: self.reservoir_capacity,
            counters: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
            meters: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
        }
    }
}

/// Exportable state of every metric in a [`Registry`], keyed by `"{module}.{name}"`.
///
/// For machine-readable output, serialize it or inspect the fields. For human-readable output,
/// use the `Display` implementation, which is intended for writing to a terminal.
///
/// Serializes as a mapping with exactly the keys `version`, `counters`, `histograms`, `meters`
/// and `timers`. There is no `gauges` key: this crate has no gauge metric, so exporters that
/// expect one must supply an empty mapping themselves.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[non_exhaustive]
pub struct RegistryView {
    /// Version of the library that produced the view.
    pub version: &'static str,

    /// Counters, sorted by name.
    pub counters: BTreeMap<String, CounterView>,
    /// Histograms, sorted by name.
    pub histograms: BTreeMap<String, HistogramView>,
    /// Meters, sorted by name.
    pub meters: BTreeMap<String, MeterView>,
    /// Timers, sorted by name.
    pub timers: BTreeMap<String, TimerView>,
}

impl RegistryView {
    /// Whether the view contains no metrics at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
            && self.histograms.is_empty()
            && self.meters.is_empty()
            && self.timers.is_empty()
    }
}

impl Display for RegistryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, counter) in &self.counters {
            writeln!(f, "{name}: {} (counter)", counter.count)?;
        }

        for (name, histogram) in &self.histograms {
            let s = &histogram.statistics;
            writeln!(
                f,
                "{name}: {} samples; min {}; mean {}; max {}; p50 {}; p99 {}",
                histogram.count, s.min, s.mean, s.max, s.p50, s.p99
            )?;
        }

        for (name, meter) in &self.meters {
            writeln!(
                f,
                "{name}: {} events; m1 {:.3}; m5 {:.3}; m15 {:.3}; mean {:.3} {}",
                meter.count,
                meter.m1_rate,
                meter.m5_rate,
                meter.m15_rate,
                meter.mean_rate,
                meter.units
            )?;
        }

        for (name, timer) in &self.timers {
            let s = &timer.statistics;
            writeln!(
                f,
                "{name}: {} calls; p50 {} {units}; p99 {} {units}; max {} {units}; m1 {:.3} {}",
                timer.count,
                s.p50,
                s.p99,
                s.max,
                timer.m1_rate,
                timer.rate_units,
                units = timer.duration_units,
            )?;
        }

        Ok(())
    }
}
