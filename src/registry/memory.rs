//! In-process registry.
//!
//! Keeps every meter in a `DashMap` keyed by [`MeterId`] and exposes read
//! accessors so callers (tests, the demo binary) can inspect what was
//! published. Timer distributions are kept in an HdrHistogram at nanosecond
//! resolution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use super::clock::{Clock, SystemClock};
use super::{Counter, Gauge, LongTaskTimer, MeterId, MeterRegistry, TaskId, Timer, TimerOptions};
use crate::error::{RegistryError, RegistryResult};

/// Significant figures kept by timer histograms.
const HIST_SIGFIG: u8 = 3;

#[derive(Clone)]
enum Meter {
    Counter(Arc<MemoryCounter>),
    Timer(Arc<MemoryTimer>),
    LongTask(Arc<MemoryLongTaskTimer>),
    Gauge(Arc<MemoryGauge>),
}

impl Meter {
    fn kind(&self) -> &'static str {
        match self {
            Meter::Counter(_) => "counter",
            Meter::Timer(_) => "timer",
            Meter::LongTask(_) => "long task timer",
            Meter::Gauge(_) => "gauge",
        }
    }
}

/// Thread-safe in-memory [`MeterRegistry`].
pub struct InMemoryRegistry {
    meters: DashMap<MeterId, Meter>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Use `clock` for long-task durations.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            meters: DashMap::new(),
            clock,
        }
    }

    /// Number of registered meters of all types.
    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    /// Current value of a counter, if registered.
    pub fn counter_value(&self, id: &MeterId) -> Option<u64> {
        match self.meters.get(id)?.value() {
            Meter::Counter(c) => Some(c.value()),
            _ => None,
        }
    }

    /// All counters registered under `name`, with their values.
    pub fn counters_named(&self, name: &str) -> Vec<(MeterId, u64)> {
        self.collect(name, |m| match m {
            Meter::Counter(c) => Some(c.value()),
            _ => None,
        })
    }

    /// Sum of every counter registered under `name`, across tag sets.
    pub fn counter_total(&self, name: &str) -> u64 {
        self.counters_named(name).iter().map(|(_, v)| v).sum()
    }

    pub fn timer_snapshot(&self, id: &MeterId) -> Option<TimerSnapshot> {
        match self.meters.get(id)?.value() {
            Meter::Timer(t) => Some(t.snapshot()),
            _ => None,
        }
    }

    pub fn timers_named(&self, name: &str) -> Vec<(MeterId, TimerSnapshot)> {
        self.collect(name, |m| match m {
            Meter::Timer(t) => Some(t.snapshot()),
            _ => None,
        })
    }

    pub fn long_task_snapshot(&self, id: &MeterId) -> Option<LongTaskSnapshot> {
        match self.meters.get(id)?.value() {
            Meter::LongTask(t) => Some(t.snapshot()),
            _ => None,
        }
    }

    pub fn gauge_value(&self, id: &MeterId) -> Option<f64> {
        match self.meters.get(id)?.value() {
            Meter::Gauge(g) => Some(g.value()),
            _ => None,
        }
    }

    /// Point-in-time view of every meter, sorted by id.
    pub fn snapshot(&self) -> Vec<MeterSnapshot> {
        let mut out: Vec<MeterSnapshot> = self
            .meters
            .iter()
            .map(|entry| {
                let id = entry.key().to_string();
                let value = match entry.value() {
                    Meter::Counter(c) => MeterValue::Counter { count: c.value() },
                    Meter::Timer(t) => MeterValue::Timer(t.snapshot()),
                    Meter::LongTask(t) => MeterValue::LongTaskTimer(t.snapshot()),
                    Meter::Gauge(g) => MeterValue::Gauge { value: g.value() },
                };
                MeterSnapshot { id, value }
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    fn collect<T>(&self, name: &str, f: impl Fn(&Meter) -> Option<T>) -> Vec<(MeterId, T)> {
        self.meters
            .iter()
            .filter(|entry| entry.key().name == name)
            .filter_map(|entry| f(entry.value()).map(|v| (entry.key().clone(), v)))
            .collect()
    }

    fn register(&self, id: &MeterId, create: impl FnOnce() -> RegistryResult<Meter>) -> RegistryResult<Meter> {
        if id.name.trim().is_empty() {
            return Err(RegistryError::InvalidName(id.name.clone()));
        }
        match self.meters.entry(id.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let meter = create()?;
                entry.insert(meter.clone());
                Ok(meter)
            }
        }
    }

    fn conflict(id: &MeterId, existing: &Meter) -> RegistryError {
        RegistryError::TypeConflict {
            name: id.name.clone(),
            existing: existing.kind(),
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterRegistry for InMemoryRegistry {
    fn counter(&self, id: &MeterId, _description: Option<&str>) -> RegistryResult<Arc<dyn Counter>> {
        match self.register(id, || Ok(Meter::Counter(Arc::new(MemoryCounter::default()))))? {
            Meter::Counter(c) => Ok(c),
            other => Err(Self::conflict(id, &other)),
        }
    }

    fn timer(&self, id: &MeterId, options: &TimerOptions) -> RegistryResult<Arc<dyn Timer>> {
        let meter = self.register(id, || MemoryTimer::new(options.clone()).map(|t| Meter::Timer(Arc::new(t))))?;
        match meter {
            Meter::Timer(t) => Ok(t),
            other => Err(Self::conflict(id, &other)),
        }
    }

    fn long_task_timer(&self, id: &MeterId) -> RegistryResult<Arc<dyn LongTaskTimer>> {
        let clock = self.clock.clone();
        let meter = self.register(id, || {
            Ok(Meter::LongTask(Arc::new(MemoryLongTaskTimer::new(id.name.clone(), clock))))
        })?;
        match meter {
            Meter::LongTask(t) => Ok(t),
            other => Err(Self::conflict(id, &other)),
        }
    }

    fn gauge(&self, id: &MeterId) -> RegistryResult<Arc<dyn Gauge>> {
        match self.register(id, || Ok(Meter::Gauge(Arc::new(MemoryGauge::default()))))? {
            Meter::Gauge(g) => Ok(g),
            other => Err(Self::conflict(id, &other)),
        }
    }
}

// ─── Meter implementations ───────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryCounter {
    count: AtomicU64,
}

impl MemoryCounter {
    fn value(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Counter for MemoryCounter {
    fn increment(&self, amount: u64) -> RegistryResult<()> {
        self.count.fetch_add(amount, Ordering::Relaxed);
        Ok(())
    }
}

struct MemoryTimer {
    options: TimerOptions,
    inner: Mutex<TimerState>,
}

struct TimerState {
    histogram: Histogram<u64>,
    count: u64,
    total_nanos: u128,
    max_nanos: u64,
}

impl MemoryTimer {
    fn new(options: TimerOptions) -> RegistryResult<Self> {
        let histogram = Histogram::<u64>::new(HIST_SIGFIG)
            .map_err(|e| RegistryError::Unavailable(format!("histogram creation: {e}")))?;
        Ok(Self {
            options,
            inner: Mutex::new(TimerState {
                histogram,
                count: 0,
                total_nanos: 0,
                max_nanos: 0,
            }),
        })
    }

    fn snapshot(&self) -> TimerSnapshot {
        let state = self.inner.lock();
        let percentiles = if self.options.percentile_histogram && state.count > 0 {
            self.options
                .percentiles
                .iter()
                .map(|&q| PercentileValue {
                    percentile: q,
                    value: Duration::from_nanos(state.histogram.value_at_quantile(q)),
                })
                .collect()
        } else {
            Vec::new()
        };
        TimerSnapshot {
            count: state.count,
            total: duration_from_nanos(state.total_nanos),
            max: Duration::from_nanos(state.max_nanos),
            percentile_histogram: self.options.percentile_histogram,
            percentiles,
        }
    }
}

impl Timer for MemoryTimer {
    fn record(&self, duration: Duration) -> RegistryResult<()> {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        let mut state = self.inner.lock();
        // HdrHistogram cannot hold zero; clamp to 1ns.
        state
            .histogram
            .record(nanos.max(1))
            .map_err(|e| RegistryError::Unavailable(format!("histogram record: {e}")))?;
        state.count += 1;
        state.total_nanos += u128::from(nanos);
        state.max_nanos = state.max_nanos.max(nanos);
        Ok(())
    }
}

struct MemoryLongTaskTimer {
    name: String,
    clock: Arc<dyn Clock>,
    next_task: AtomicU64,
    running: DashMap<u64, u64>,
    completed: AtomicU64,
}

impl MemoryLongTaskTimer {
    fn new(name: String, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            clock,
            next_task: AtomicU64::new(1),
            running: DashMap::new(),
            completed: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> LongTaskSnapshot {
        let now = self.clock.monotonic_nanos();
        let total: u64 = self
            .running
            .iter()
            .map(|entry| now.saturating_sub(*entry.value()))
            .sum();
        LongTaskSnapshot {
            active_tasks: self.running.len(),
            completed: self.completed.load(Ordering::Relaxed),
            active_duration: Duration::from_nanos(total),
        }
    }
}

impl LongTaskTimer for MemoryLongTaskTimer {
    fn start(&self) -> RegistryResult<TaskId> {
        let task = self.next_task.fetch_add(1, Ordering::Relaxed);
        self.running.insert(task, self.clock.monotonic_nanos());
        Ok(TaskId(task))
    }

    fn stop(&self, task: TaskId) -> RegistryResult<Duration> {
        let (_, started) = self.running.remove(&task.0).ok_or_else(|| RegistryError::UnknownTask {
            name: self.name.clone(),
            task: task.0,
        })?;
        self.completed.fetch_add(1, Ordering::Relaxed);
        Ok(Duration::from_nanos(self.clock.monotonic_nanos().saturating_sub(started)))
    }

    fn active_tasks(&self) -> usize {
        self.running.len()
    }
}

#[derive(Debug, Default)]
struct MemoryGauge {
    value: Mutex<f64>,
}

impl MemoryGauge {
    fn value(&self) -> f64 {
        *self.value.lock()
    }
}

impl Gauge for MemoryGauge {
    fn increment(&self, amount: f64) -> RegistryResult<()> {
        *self.value.lock() += amount;
        Ok(())
    }

    fn decrement(&self, amount: f64) -> RegistryResult<()> {
        *self.value.lock() -= amount;
        Ok(())
    }
}

fn duration_from_nanos(nanos: u128) -> Duration {
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

// ─── Snapshots ───────────────────────────────────────────────────

/// Recorded distribution of a timer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerSnapshot {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
    pub percentile_histogram: bool,
    pub percentiles: Vec<PercentileValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongTaskSnapshot {
    pub active_tasks: usize,
    pub completed: u64,
    /// Summed elapsed time of the tasks still running.
    pub active_duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeterValue {
    Counter { count: u64 },
    Timer(TimerSnapshot),
    LongTaskTimer(LongTaskSnapshot),
    Gauge { value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterSnapshot {
    pub id: String,
    pub value: MeterValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MockClock;
    use crate::spec::Tags;

    fn id(name: &str) -> MeterId {
        MeterId::new(name, &Tags::new())
    }

    #[test]
    fn test_counter_register_or_fetch() {
        let registry = InMemoryRegistry::new();
        let a = registry.counter(&id("calls"), None).unwrap();
        let b = registry.counter(&id("calls"), None).unwrap();
        a.increment(1).unwrap();
        b.increment(2).unwrap();
        assert_eq!(registry.counter_value(&id("calls")), Some(3));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_tags_distinguish_meters() {
        let registry = InMemoryRegistry::new();
        let ok = MeterId::new("calls", &Tags::from_pairs(["result", "success"]).unwrap());
        let err = MeterId::new("calls", &Tags::from_pairs(["result", "failure"]).unwrap());
        registry.counter(&ok, None).unwrap().increment(1).unwrap();
        registry.counter(&err, None).unwrap().increment(4).unwrap();
        assert_eq!(registry.counters_named("calls").len(), 2);
        assert_eq!(registry.counter_total("calls"), 5);
    }

    #[test]
    fn test_type_conflict() {
        let registry = InMemoryRegistry::new();
        registry.counter(&id("x"), None).unwrap();
        let err = registry.timer(&id("x"), &TimerOptions::default()).err().unwrap();
        assert_eq!(
            err,
            RegistryError::TypeConflict {
                name: "x".into(),
                existing: "counter"
            }
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = InMemoryRegistry::new();
        assert!(matches!(registry.counter(&id(" "), None), Err(RegistryError::InvalidName(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_timer_keeps_nanoseconds() {
        let registry = InMemoryRegistry::new();
        let timer = registry.timer(&id("t"), &TimerOptions::default()).unwrap();
        timer.record(Duration::from_nanos(1_234_567)).unwrap();
        timer.record(Duration::from_nanos(3)).unwrap();
        let snap = registry.timer_snapshot(&id("t")).unwrap();
        assert_eq!(snap.count, 2);
        assert_eq!(snap.total, Duration::from_nanos(1_234_570));
        assert_eq!(snap.max, Duration::from_nanos(1_234_567));
        assert!(snap.percentiles.is_empty());
    }

    #[test]
    fn test_timer_percentiles() {
        let registry = InMemoryRegistry::new();
        let options = TimerOptions {
            description: None,
            percentile_histogram: true,
            percentiles: vec![0.5, 0.99],
        };
        let timer = registry.timer(&id("p"), &options).unwrap();
        for ms in 1..=100 {
            timer.record(Duration::from_millis(ms)).unwrap();
        }
        let snap = registry.timer_snapshot(&id("p")).unwrap();
        assert_eq!(snap.percentiles.len(), 2);
        let p50 = snap.percentiles[0].value.as_millis();
        assert!((49..=51).contains(&p50), "p50 was {p50}ms");
    }

    #[test]
    fn test_long_task_timer_tracks_overlap() {
        let clock = Arc::new(MockClock::new());
        let registry = InMemoryRegistry::with_clock(clock.clone());
        let ltt = registry.long_task_timer(&id("batch")).unwrap();

        let first = ltt.start().unwrap();
        clock.advance(Duration::from_secs(2));
        let second = ltt.start().unwrap();
        assert_eq!(ltt.active_tasks(), 2);

        clock.advance(Duration::from_secs(1));
        assert_eq!(ltt.stop(first).unwrap(), Duration::from_secs(3));
        assert_eq!(ltt.stop(second).unwrap(), Duration::from_secs(1));
        assert_eq!(ltt.active_tasks(), 0);

        let err = ltt.stop(first).err().unwrap();
        assert!(matches!(err, RegistryError::UnknownTask { task, .. } if task == first.0));

        let snap = registry.long_task_snapshot(&id("batch")).unwrap();
        assert_eq!(snap.completed, 2);
    }

    #[test]
    fn test_gauge_moves_both_ways() {
        let registry = InMemoryRegistry::new();
        let gauge = registry.gauge(&id("active")).unwrap();
        gauge.increment(1.0).unwrap();
        gauge.increment(1.0).unwrap();
        gauge.decrement(1.0).unwrap();
        assert_eq!(registry.gauge_value(&id("active")), Some(1.0));
    }

    #[test]
    fn test_snapshot_sorted() {
        let registry = InMemoryRegistry::new();
        registry.counter(&id("b"), None).unwrap().increment(1).unwrap();
        registry.gauge(&id("a")).unwrap();
        let snap = registry.snapshot();
        assert_eq!(snap[0].id, "a");
        assert_eq!(snap[1].value, MeterValue::Counter { count: 1 });
    }
}
