//! Timer engine.
//!
//! # Responsibilities
//! - Open point-in-time samples and long-task samples
//! - Register the timer on stop and record the full-resolution duration
//! - Log the measured duration, default or custom format
//!
//! # Design Decisions
//! - Samples are consumed on stop, so a sample cannot be stopped twice
//! - Registry failures are logged and degrade to a zero duration
//! - Unit conversion happens only when formatting log text

use std::sync::Arc;
use std::time::Duration;

use crate::registry::{Clock, LongTaskTimer, MeterId, MeterRegistry, TaskId, TimerOptions};
use crate::spec::{MetricSpec, TimeUnit};

/// An open point-in-time timer sample.
#[derive(Debug)]
#[must_use = "a sample must be stopped"]
pub struct TimerSample {
    started_nanos: u64,
}

/// An open task on a long-task timer.
#[must_use = "a sample must be stopped"]
pub struct LongTaskSample {
    timer: Arc<dyn LongTaskTimer>,
    task: TaskId,
}

impl std::fmt::Debug for LongTaskSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongTaskSample").field("task", &self.task).finish()
    }
}

/// Produces duration measurements against a shared registry.
#[derive(Clone)]
pub struct TimerEngine {
    registry: Arc<dyn MeterRegistry>,
    clock: Arc<dyn Clock>,
}

impl TimerEngine {
    pub fn new(registry: Arc<dyn MeterRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    pub fn start_timer(&self) -> TimerSample {
        TimerSample {
            started_nanos: self.clock.monotonic_nanos(),
        }
    }

    /// Stop `sample` and record it under `spec.name`.
    ///
    /// Returns the elapsed time, or zero if the timer could not be registered
    /// or recorded.
    pub fn stop_timer(&self, sample: TimerSample, spec: &MetricSpec) -> Duration {
        let elapsed = Duration::from_nanos(self.clock.monotonic_nanos().saturating_sub(sample.started_nanos));
        let id = MeterId::new(spec.name.clone(), &spec.timer_tags);

        let mut options = TimerOptions {
            description: spec.description.clone(),
            ..TimerOptions::default()
        };
        if spec.publish_percentiles {
            options.percentile_histogram = true;
            options.percentiles = spec.percentiles.clone();
        }

        let recorded = self
            .registry
            .timer(&id, &options)
            .and_then(|timer| timer.record(elapsed));

        match recorded {
            Ok(()) => {
                log_duration(spec, elapsed);
                elapsed
            }
            Err(e) => {
                tracing::warn!(metric = %spec.name, error = %e, "Error stopping timer");
                Duration::ZERO
            }
        }
    }

    /// Start a task on the long-task timer `spec.name`.
    ///
    /// Returns `None` when the timer cannot be registered or started.
    pub fn start_long_task(&self, spec: &MetricSpec) -> Option<LongTaskSample> {
        let id = MeterId::new(spec.name.clone(), &spec.timer_tags);
        let started = self
            .registry
            .long_task_timer(&id)
            .and_then(|timer| timer.start().map(|task| LongTaskSample { timer, task }));

        match started {
            Ok(sample) => Some(sample),
            Err(e) => {
                tracing::warn!(metric = %spec.name, error = %e, "Error starting long task timer");
                None
            }
        }
    }

    pub fn stop_long_task(&self, sample: LongTaskSample, spec: &MetricSpec) -> Duration {
        match sample.timer.stop(sample.task) {
            Ok(elapsed) => {
                log_duration(spec, elapsed);
                elapsed
            }
            Err(e) => {
                tracing::warn!(metric = %spec.name, error = %e, "Error stopping long task timer");
                Duration::ZERO
            }
        }
    }
}

/// Fill the first `{}` in `template` with `duration` expressed in `unit`.
///
/// Templates without a placeholder get the value appended.
pub fn render_template(template: &str, duration: Duration, unit: TimeUnit) -> String {
    let value = unit.convert(duration).to_string();
    match template.split_once("{}") {
        Some((head, tail)) => format!("{head}{value}{tail}"),
        None => format!("{template} {value}"),
    }
}

fn log_duration(spec: &MetricSpec, elapsed: Duration) {
    if spec.enable_custom_logging {
        let message = render_template(&spec.log_template, elapsed, spec.timer_unit);
        tracing::info!(metric = %spec.name, unit = %spec.timer_unit, "{}", message);
    } else {
        tracing::debug!(
            metric = %spec.name,
            duration_ms = TimeUnit::Milliseconds.convert(elapsed) as u64,
            "Total execution time for {} is {}ms",
            spec.name,
            TimeUnit::Milliseconds.convert(elapsed)
        );
    }
}
