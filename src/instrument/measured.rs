//! Per-invocation measurement state.
//!
//! # State Transitions
//! ```text
//! Idle → Started: ActiveMeasurement::start (samples opened)
//! Started → Settled: the call returned, or its deferred result completed
//! Settled → Published: timer stopped, gauge lowered, counter incremented
//! Started → Published: guard dropped without settling
//!     - while panicking: failure tagged exception=panic
//!     - otherwise (deferred result cancelled): timer only, no count
//! ```
//!
//! The open samples live in an `Option` that is taken on publish, so the
//! `Published` state is reached exactly once whichever path gets there first.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use pin_project_lite::pin_project;

use super::dispatcher::Engines;
use super::gauge::InFlight;
use super::invocation::MethodSignature;
use super::outcome::{Classify, FailureTags, Outcome};
use super::timer::{LongTaskSample, TimerSample};
use crate::spec::MetricSpec;

enum OpenTimer {
    PointInTime(TimerSample),
    LongTask(LongTaskSample),
}

struct OpenSamples {
    timer: Option<OpenTimer>,
    in_flight: Option<InFlight>,
}

/// Guard owning the open samples of one invocation.
pub(crate) struct ActiveMeasurement {
    engines: Arc<Engines>,
    spec: Arc<MetricSpec>,
    method: Option<MethodSignature>,
    open: Option<OpenSamples>,
}

impl ActiveMeasurement {
    pub(crate) fn start(engines: Arc<Engines>, spec: Arc<MetricSpec>, method: Option<MethodSignature>) -> Self {
        let timer = if !spec.enable_timer {
            None
        } else if spec.long_task {
            engines.timers.start_long_task(&spec).map(OpenTimer::LongTask)
        } else {
            Some(OpenTimer::PointInTime(engines.timers.start_timer()))
        };
        let in_flight = if spec.enable_gauge {
            engines.gauges.enter(&spec)
        } else {
            None
        };

        Self {
            engines,
            spec,
            method,
            open: Some(OpenSamples { timer, in_flight }),
        }
    }

    /// Publish the settled result of the call.
    pub(crate) fn settle<T, E: Classify>(mut self, result: &Result<T, E>) {
        // Only classify when someone reads the tags.
        let outcome = self.spec.enable_counter.then(|| Outcome::of(result));
        self.publish(outcome);
    }

    fn publish(&mut self, outcome: Option<Outcome>) {
        let Some(open) = self.open.take() else {
            return;
        };

        match open.timer {
            Some(OpenTimer::PointInTime(sample)) => {
                self.engines.timers.stop_timer(sample, &self.spec);
            }
            Some(OpenTimer::LongTask(sample)) => {
                self.engines.timers.stop_long_task(sample, &self.spec);
            }
            None => {}
        }
        if let Some(slot) = open.in_flight {
            self.engines.gauges.exit(slot, &self.spec);
        }
        if let Some(outcome) = outcome {
            self.engines.counters.record_outcome(&self.spec, &outcome);
        }
    }
}

impl Drop for ActiveMeasurement {
    fn drop(&mut self) {
        if self.open.is_none() {
            return;
        }
        if std::thread::panicking() {
            let outcome = self
                .spec
                .enable_counter
                .then(|| Outcome::Failure(FailureTags::panic()));
            self.publish(outcome);
        } else {
            tracing::debug!(
                metric = %self.spec.name,
                method = ?self.method.as_ref().map(ToString::to_string),
                "Invocation dropped before settling"
            );
            self.publish(None);
        }
    }
}

pin_project! {
    /// A deferred result with completion handling attached.
    ///
    /// Resolves to exactly what the wrapped future resolves to. The
    /// measurement is published on whichever thread polls it to completion.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct Measured<Fut> {
        #[pin]
        inner: Fut,
        measurement: Option<ActiveMeasurement>,
    }
}

impl<Fut> Measured<Fut> {
    pub(crate) fn new(inner: Fut, measurement: ActiveMeasurement) -> Self {
        Self {
            inner,
            measurement: Some(measurement),
        }
    }

    /// True once the wrapped future has completed and been published.
    pub fn is_settled(&self) -> bool {
        self.measurement.is_none()
    }
}

impl<Fut, T, E> Future for Measured<Fut>
where
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let guard = UnwindGuard(this.measurement);
        let result = ready!(this.inner.poll(cx));
        if let Some(measurement) = guard.0.take() {
            measurement.settle(&result);
        }
        Poll::Ready(result)
    }
}

/// Publishes as a panic when the wrapped future panics inside `poll`, even if
/// the caller catches the unwind and keeps the future alive.
struct UnwindGuard<'a>(&'a mut Option<ActiveMeasurement>);

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            drop(self.0.take());
        }
    }
}
