//! Around-advice entry point.
//!
//! # Responsibilities
//! - Pick the immediate or deferred path from the declared call shape
//! - Open the samples the spec asks for before the real call proceeds
//! - Return the real call's result, or its deferred result, unchanged
//!
//! # Design Decisions
//! - One registry is injected at construction and shared by every call
//! - The dispatcher never blocks or spawns; deferred completion runs on the
//!   thread that drives the caller's future
//! - Timer, counter and gauge are independent and compose freely

use std::future::Future;
use std::sync::Arc;

use super::counter::CounterEngine;
use super::gauge::GaugeEngine;
use super::invocation::{InvocationContext, MethodSignature, Proceed, Proceeded};
use super::measured::{ActiveMeasurement, Measured};
use super::outcome::Classify;
use super::timer::TimerEngine;
use crate::registry::{Clock, MeterRegistry, SystemClock};
use crate::spec::MetricSpec;

pub(crate) struct Engines {
    pub(crate) timers: TimerEngine,
    pub(crate) counters: CounterEngine,
    pub(crate) gauges: GaugeEngine,
}

/// Wraps invocations and publishes their measurements.
#[derive(Clone)]
pub struct Dispatcher {
    engines: Arc<Engines>,
}

impl Dispatcher {
    /// Create a dispatcher timing with the system clock.
    pub fn new(registry: Arc<dyn MeterRegistry>) -> Self {
        Self::with_clock(registry, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(registry: Arc<dyn MeterRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            engines: Arc::new(Engines {
                timers: TimerEngine::new(registry.clone(), clock),
                counters: CounterEngine::new(registry.clone()),
                gauges: GaugeEngine::new(registry),
            }),
        }
    }

    pub fn timers(&self) -> &TimerEngine {
        &self.engines.timers
    }

    pub fn counters(&self) -> &CounterEngine {
        &self.engines.counters
    }

    /// Proceed with an intercepted call, measuring it according to `spec`.
    pub fn around<F, Fut, T, E>(
        &self,
        ctx: InvocationContext<F, Fut>,
        spec: impl Into<Arc<MetricSpec>>,
    ) -> Proceeded<T, E, Fut>
    where
        F: FnOnce() -> Result<T, E>,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let spec = spec.into();
        tracing::trace!(method = %ctx.method, metric = %spec.name, "Intercepted invocation");

        match ctx.proceed {
            Proceed::Immediate(call) => Proceeded::Immediate(self.measure(spec, Some(ctx.method), call)),
            Proceed::Deferred(future) => Proceeded::Deferred(self.measure_deferred(spec, Some(ctx.method), future)),
        }
    }

    /// Measure a blocking call.
    ///
    /// Samples are stopped whether `call` returns `Ok`, `Err`, or unwinds.
    pub fn call<F, T, E>(&self, spec: impl Into<Arc<MetricSpec>>, call: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: Classify,
    {
        self.measure(spec.into(), None, call)
    }

    /// Measure a deferred call.
    ///
    /// Samples open now; they are published when the returned future
    /// completes.
    pub fn call_async<Fut, T, E>(&self, spec: impl Into<Arc<MetricSpec>>, future: Fut) -> Measured<Fut>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        self.measure_deferred(spec.into(), None, future)
    }

    fn measure<F, T, E>(&self, spec: Arc<MetricSpec>, method: Option<MethodSignature>, call: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: Classify,
    {
        if !spec.is_active() {
            return call();
        }
        let measurement = ActiveMeasurement::start(self.engines.clone(), spec, method);
        let result = call();
        measurement.settle(&result);
        result
    }

    fn measure_deferred<Fut>(&self, spec: Arc<MetricSpec>, method: Option<MethodSignature>, future: Fut) -> Measured<Fut> {
        Measured::new(future, ActiveMeasurement::start(self.engines.clone(), spec, method))
    }
}
