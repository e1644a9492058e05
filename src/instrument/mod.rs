//! Interception and measurement engine.
//!
//! # Data Flow
//! ```text
//! interceptor
//!     → dispatcher.rs (InvocationContext + MetricSpec)
//!     → measured.rs (open samples, one guard per invocation)
//!         → timer.rs   (point-in-time or long-task timer)
//!         → gauge.rs   (in-flight gauge)
//!     → real method runs / deferred result settles
//!     → outcome.rs (classify Err into exception + error.code)
//!     → counter.rs (outcome-tagged increment)
//!     → MeterRegistry + tracing
//! ```
//!
//! # Design Decisions
//! - Business errors pass through untouched; instrumentation errors are
//!   logged and absorbed
//! - Open samples are owned by a drop guard, so every exit path closes them
//! - The call shape is declared by the interceptor, never inferred

pub mod counter;
pub mod dispatcher;
pub mod gauge;
pub mod invocation;
pub mod measured;
pub mod outcome;
pub mod timer;

pub use dispatcher::Dispatcher;
pub use invocation::{InvocationContext, MethodSignature, Proceed, Proceeded};
pub use measured::Measured;
pub use outcome::{classify, Classify, FailureTags, HasErrorCode, Outcome};
