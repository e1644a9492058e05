//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use method_metrics::error::{RegistryError, RegistryResult};
use method_metrics::instrument::counter::{ERROR_CODE_TAG, EXCEPTION_TAG, RESULT_TAG};
use method_metrics::instrument::{Classify, HasErrorCode};
use method_metrics::registry::{
    Counter, Gauge, InMemoryRegistry, LongTaskTimer, MeterId, MeterRegistry, MockClock, Timer, TimerOptions,
};
use method_metrics::spec::Tags;
use method_metrics::Dispatcher;

/// Dispatcher over an in-memory registry driven by a mock clock.
pub fn mock_setup() -> (Dispatcher, Arc<InMemoryRegistry>, Arc<MockClock>) {
    let clock = Arc::new(MockClock::new());
    let registry = Arc::new(InMemoryRegistry::with_clock(clock.clone()));
    (Dispatcher::with_clock(registry.clone(), clock.clone()), registry, clock)
}

/// Dispatcher over an in-memory registry timed by the system clock.
pub fn system_setup() -> (Dispatcher, Arc<InMemoryRegistry>) {
    let registry = Arc::new(InMemoryRegistry::new());
    (Dispatcher::new(registry.clone()), registry)
}

/// Counter id with the outcome tags in publication order, then `extra`.
pub fn counter_id(name: &str, exception: &str, result: &str, code: &str, extra: &[&str]) -> MeterId {
    let mut tags = Tags::from_pairs([EXCEPTION_TAG, exception, RESULT_TAG, result, ERROR_CODE_TAG, code])
        .expect("even tag list");
    tags.extend(&Tags::from_pairs(extra.iter().copied()).expect("even tag list"));
    MeterId::new(name, &tags)
}

pub fn plain_id(name: &str) -> MeterId {
    MeterId::new(name, &Tags::new())
}

/// Failure carrying an error code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub code: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl HasErrorCode for ValidationError {
    fn error_code(&self) -> &str {
        &self.code
    }
}

impl Classify for ValidationError {
    fn as_error_code(&self) -> Option<&dyn HasErrorCode> {
        Some(self)
    }
}

/// Failure without an error code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upstream timed out")]
pub struct TimeoutError;

impl Classify for TimeoutError {}

/// Failure wrapping another one as its cause.
#[derive(Debug, thiserror::Error)]
#[error("execution failed")]
pub struct ExecutionError {
    #[source]
    pub cause: ValidationError,
}

impl Classify for ExecutionError {}

/// Registry whose every operation fails.
#[derive(Default)]
pub struct FailingRegistry {
    pub attempts: AtomicUsize,
}

impl FailingRegistry {
    fn fail<T>(&self) -> RegistryResult<T> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(RegistryError::Unavailable("registry offline".into()))
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl MeterRegistry for FailingRegistry {
    fn counter(&self, _id: &MeterId, _description: Option<&str>) -> RegistryResult<Arc<dyn Counter>> {
        self.fail()
    }

    fn timer(&self, _id: &MeterId, _options: &TimerOptions) -> RegistryResult<Arc<dyn Timer>> {
        self.fail()
    }

    fn long_task_timer(&self, _id: &MeterId) -> RegistryResult<Arc<dyn LongTaskTimer>> {
        self.fail()
    }

    fn gauge(&self, _id: &MeterId) -> RegistryResult<Arc<dyn Gauge>> {
        self.fail()
    }
}

/// Registry that hands out meters whose recording calls fail.
#[derive(Default)]
pub struct BrokenMeters;

struct BrokenMeter;

impl Counter for BrokenMeter {
    fn increment(&self, _amount: u64) -> RegistryResult<()> {
        Err(RegistryError::Unavailable("counter".into()))
    }
}

impl Timer for BrokenMeter {
    fn record(&self, _duration: Duration) -> RegistryResult<()> {
        Err(RegistryError::Unavailable("timer".into()))
    }
}

impl Gauge for BrokenMeter {
    fn increment(&self, _amount: f64) -> RegistryResult<()> {
        Err(RegistryError::Unavailable("gauge".into()))
    }

    fn decrement(&self, _amount: f64) -> RegistryResult<()> {
        Err(RegistryError::Unavailable("gauge".into()))
    }
}

impl LongTaskTimer for BrokenMeter {
    fn start(&self) -> RegistryResult<method_metrics::registry::TaskId> {
        Err(RegistryError::Unavailable("long task".into()))
    }

    fn stop(&self, task: method_metrics::registry::TaskId) -> RegistryResult<Duration> {
        Err(RegistryError::UnknownTask {
            name: "broken".into(),
            task: task.0,
        })
    }

    fn active_tasks(&self) -> usize {
        0
    }
}

impl MeterRegistry for BrokenMeters {
    fn counter(&self, _id: &MeterId, _description: Option<&str>) -> RegistryResult<Arc<dyn Counter>> {
        Ok(Arc::new(BrokenMeter))
    }

    fn timer(&self, _id: &MeterId, _options: &TimerOptions) -> RegistryResult<Arc<dyn Timer>> {
        Ok(Arc::new(BrokenMeter))
    }

    fn long_task_timer(&self, _id: &MeterId) -> RegistryResult<Arc<dyn LongTaskTimer>> {
        Ok(Arc::new(BrokenMeter))
    }

    fn gauge(&self, _id: &MeterId) -> RegistryResult<Arc<dyn Gauge>> {
        Ok(Arc::new(BrokenMeter))
    }
}

/// Sleep on the tokio timer, then resolve to `result`.
pub async fn after<T, E>(delay: Duration, result: Result<T, E>) -> Result<T, E> {
    tokio::time::sleep(delay).await;
    result
}
