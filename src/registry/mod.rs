//! Metrics backend abstraction.
//!
//! # Responsibilities
//! - Define the register-or-fetch contract the engines publish through
//! - Identify meters by name plus the full ordered tag set
//! - Provide the monotonic clock used to time samples
//!
//! # Implementations
//! - `memory.rs`: queryable in-process registry (tests, demo binary)
//! - `facade.rs`: forwards to the global `metrics` recorder
//!
//! # Design Decisions
//! - One long-lived registry is shared as `Arc<dyn MeterRegistry>` by every
//!   invocation; implementations must be safe for concurrent use
//! - Every operation is fallible; callers decide how to degrade
//! - Durations cross this boundary at full nanosecond resolution

pub mod clock;
pub mod facade;
pub mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RegistryResult;
use crate::spec::{Tag, Tags};

pub use clock::{Clock, MockClock, SystemClock};
pub use facade::FacadeRegistry;
pub use memory::InMemoryRegistry;

/// Identity of a meter: its name and complete tag set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeterId {
    pub name: String,
    pub tags: Vec<Tag>,
}

impl MeterId {
    pub fn new(name: impl Into<String>, tags: &Tags) -> Self {
        Self {
            name: name.into(),
            tags: tags.as_slice().to_vec(),
        }
    }

    /// Look up a tag value by key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|t| t.key == key).map(|t| t.value.as_str())
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.tags.is_empty() {
            f.write_str("{")?;
            for (i, tag) in self.tags.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}={}", tag.key, tag.value)?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}

/// Distribution options applied when a timer is registered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerOptions {
    pub description: Option<String>,
    pub percentile_histogram: bool,
    pub percentiles: Vec<f64>,
}

/// Identifier of one running task on a [`LongTaskTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

/// A monotonically increasing counter.
pub trait Counter: Send + Sync {
    fn increment(&self, amount: u64) -> RegistryResult<()>;
}

/// A timer receiving completed durations.
pub trait Timer: Send + Sync {
    fn record(&self, duration: Duration) -> RegistryResult<()>;
}

/// A timer tracking concurrently running tasks.
pub trait LongTaskTimer: Send + Sync {
    fn start(&self) -> RegistryResult<TaskId>;

    /// Stop a running task, returning how long it ran.
    fn stop(&self, task: TaskId) -> RegistryResult<Duration>;

    fn active_tasks(&self) -> usize;
}

/// A gauge moved up and down around in-flight work.
pub trait Gauge: Send + Sync {
    fn increment(&self, amount: f64) -> RegistryResult<()>;
    fn decrement(&self, amount: f64) -> RegistryResult<()>;
}

/// Register-or-fetch access to a metrics backend.
pub trait MeterRegistry: Send + Sync {
    fn counter(&self, id: &MeterId, description: Option<&str>) -> RegistryResult<Arc<dyn Counter>>;

    fn timer(&self, id: &MeterId, options: &TimerOptions) -> RegistryResult<Arc<dyn Timer>>;

    fn long_task_timer(&self, id: &MeterId) -> RegistryResult<Arc<dyn LongTaskTimer>>;

    fn gauge(&self, id: &MeterId) -> RegistryResult<Arc<dyn Gauge>>;
}
