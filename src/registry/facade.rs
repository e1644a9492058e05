//! Registry adapter over the `metrics` facade.
//!
//! Meters are forwarded to whatever global recorder the application installed
//! (for instance the Prometheus recorder from
//! [`crate::observability::exporter`]). Without a recorder every operation is
//! a no-op, which is the facade's own behavior.
//!
//! # Mapping
//! - counter → `counter!(name, tags)`
//! - timer → `histogram!(name, tags)` in seconds
//! - long-task timer → `gauge!("<name>.active", tags)` for running tasks plus
//!   `histogram!("<name>.duration", tags)` on stop
//! - gauge → `gauge!(name, tags)`
//!
//! Percentile publication is a recorder concern with this backend: quantiles
//! are configured once on the exporter, not per histogram.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::{Label, Unit};

use super::clock::{Clock, SystemClock};
use super::{Counter, Gauge, LongTaskTimer, MeterId, MeterRegistry, TaskId, Timer, TimerOptions};
use crate::error::{RegistryError, RegistryResult};

/// [`MeterRegistry`] publishing through the `metrics` crate macros.
pub struct FacadeRegistry {
    kinds: DashMap<MeterId, &'static str>,
    /// Long-task handles own their running tasks, so one handle per id.
    long_tasks: DashMap<MeterId, Arc<FacadeLongTaskTimer>>,
    clock: Arc<dyn Clock>,
}

impl FacadeRegistry {
    pub fn new() -> Self {
        Self {
            kinds: DashMap::new(),
            long_tasks: DashMap::new(),
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Record the meter type for `id`, returning true on first registration.
    fn claim(&self, id: &MeterId, kind: &'static str) -> RegistryResult<bool> {
        if id.name.trim().is_empty() {
            return Err(RegistryError::InvalidName(id.name.clone()));
        }
        match self.kinds.entry(id.clone()) {
            Entry::Occupied(entry) if *entry.get() == kind => Ok(false),
            Entry::Occupied(entry) => Err(RegistryError::TypeConflict {
                name: id.name.clone(),
                existing: *entry.get(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(kind);
                Ok(true)
            }
        }
    }
}

impl Default for FacadeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn labels(id: &MeterId) -> Vec<Label> {
    id.tags
        .iter()
        .map(|t| Label::new(t.key.clone(), t.value.clone()))
        .collect()
}

impl MeterRegistry for FacadeRegistry {
    fn counter(&self, id: &MeterId, description: Option<&str>) -> RegistryResult<Arc<dyn Counter>> {
        if self.claim(id, "counter")? {
            if let Some(description) = description {
                metrics::describe_counter!(id.name.clone(), description.to_string());
            }
        }
        Ok(Arc::new(FacadeCounter(metrics::counter!(id.name.clone(), labels(id)))))
    }

    fn timer(&self, id: &MeterId, options: &TimerOptions) -> RegistryResult<Arc<dyn Timer>> {
        if self.claim(id, "timer")? {
            let description = options.description.clone().unwrap_or_default();
            metrics::describe_histogram!(id.name.clone(), Unit::Seconds, description);
            if options.percentile_histogram {
                tracing::debug!(
                    metric = %id.name,
                    percentiles = ?options.percentiles,
                    "Percentiles for facade timers are published by the installed recorder"
                );
            }
        }
        Ok(Arc::new(FacadeTimer(metrics::histogram!(id.name.clone(), labels(id)))))
    }

    fn long_task_timer(&self, id: &MeterId) -> RegistryResult<Arc<dyn LongTaskTimer>> {
        self.claim(id, "long task timer")?;
        let timer = self
            .long_tasks
            .entry(id.clone())
            .or_insert_with(|| {
                let tags = labels(id);
                Arc::new(FacadeLongTaskTimer {
                    name: id.name.clone(),
                    active: metrics::gauge!(format!("{}.active", id.name), tags.clone()),
                    duration: metrics::histogram!(format!("{}.duration", id.name), tags),
                    clock: self.clock.clone(),
                    next_task: AtomicU64::new(1),
                    running: DashMap::new(),
                })
            })
            .clone();
        Ok(timer)
    }

    fn gauge(&self, id: &MeterId) -> RegistryResult<Arc<dyn Gauge>> {
        self.claim(id, "gauge")?;
        Ok(Arc::new(FacadeGauge(metrics::gauge!(id.name.clone(), labels(id)))))
    }
}

struct FacadeCounter(metrics::Counter);

impl Counter for FacadeCounter {
    fn increment(&self, amount: u64) -> RegistryResult<()> {
        self.0.increment(amount);
        Ok(())
    }
}

struct FacadeTimer(metrics::Histogram);

impl Timer for FacadeTimer {
    fn record(&self, duration: Duration) -> RegistryResult<()> {
        self.0.record(duration.as_secs_f64());
        Ok(())
    }
}

struct FacadeGauge(metrics::Gauge);

impl Gauge for FacadeGauge {
    fn increment(&self, amount: f64) -> RegistryResult<()> {
        self.0.increment(amount);
        Ok(())
    }

    fn decrement(&self, amount: f64) -> RegistryResult<()> {
        self.0.decrement(amount);
        Ok(())
    }
}

struct FacadeLongTaskTimer {
    name: String,
    active: metrics::Gauge,
    duration: metrics::Histogram,
    clock: Arc<dyn Clock>,
    next_task: AtomicU64,
    running: DashMap<u64, u64>,
}

impl LongTaskTimer for FacadeLongTaskTimer {
    fn start(&self) -> RegistryResult<TaskId> {
        let task = self.next_task.fetch_add(1, Ordering::Relaxed);
        self.running.insert(task, self.clock.monotonic_nanos());
        self.active.increment(1.0);
        Ok(TaskId(task))
    }

    fn stop(&self, task: TaskId) -> RegistryResult<Duration> {
        let (_, started) = self.running.remove(&task.0).ok_or_else(|| RegistryError::UnknownTask {
            name: self.name.clone(),
            task: task.0,
        })?;
        let elapsed = Duration::from_nanos(self.clock.monotonic_nanos().saturating_sub(started));
        self.active.decrement(1.0);
        self.duration.record(elapsed.as_secs_f64());
        Ok(elapsed)
    }

    fn active_tasks(&self) -> usize {
        self.running.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Tags;

    #[test]
    fn test_facade_without_recorder_is_noop() {
        let registry = FacadeRegistry::new();
        let id = MeterId::new("facade.calls", &Tags::from_pairs(["result", "success"]).unwrap());
        let counter = registry.counter(&id, Some("calls")).unwrap();
        assert!(counter.increment(1).is_ok());
        let timer = registry.timer(&MeterId::new("facade.time", &Tags::new()), &TimerOptions::default());
        assert!(timer.unwrap().record(Duration::from_millis(5)).is_ok());
    }

    #[test]
    fn test_facade_rejects_type_conflict() {
        let registry = FacadeRegistry::new();
        let id = MeterId::new("facade.shared", &Tags::new());
        registry.gauge(&id).unwrap();
        assert!(matches!(
            registry.counter(&id, None),
            Err(RegistryError::TypeConflict { existing: "gauge", .. })
        ));
    }

    #[test]
    fn test_facade_long_task_round_trip() {
        let registry = FacadeRegistry::new();
        let ltt = registry.long_task_timer(&MeterId::new("facade.batch", &Tags::new())).unwrap();
        let task = ltt.start().unwrap();
        assert_eq!(ltt.active_tasks(), 1);
        ltt.stop(task).unwrap();
        assert_eq!(ltt.active_tasks(), 0);
        assert!(ltt.stop(task).is_err());
    }

    #[test]
    fn test_facade_long_task_handle_shared_per_id() {
        let registry = FacadeRegistry::new();
        let id = MeterId::new("facade.import", &Tags::new());
        let first = registry.long_task_timer(&id).unwrap();
        let task = first.start().unwrap();

        let second = registry.long_task_timer(&id).unwrap();
        assert_eq!(second.active_tasks(), 1);
        assert!(second.stop(task).is_ok());
        assert_eq!(first.active_tasks(), 0);
    }
}
