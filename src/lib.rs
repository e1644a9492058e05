//! Method-level metrics instrumentation.
//!
//! Wraps method invocations, blocking or deferred, and publishes execution
//! timers, outcome counters and in-flight gauges to a pluggable meter
//! registry. Measurement never changes what the wrapped call returns.

pub mod config;
pub mod error;
pub mod instrument;
pub mod observability;
pub mod registry;
pub mod spec;

pub use config::SpecCatalog;
pub use error::{MetricHandlerError, RegistryError};
pub use instrument::{Classify, Dispatcher, HasErrorCode, InvocationContext, MethodSignature};
pub use registry::{FacadeRegistry, InMemoryRegistry, MeterRegistry};
pub use spec::{MetricSpec, Tags, TimeUnit};
