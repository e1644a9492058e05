//! Error types shared across the crate.

use thiserror::Error;

use crate::instrument::outcome::{Classify, HasErrorCode};

/// Errors raised by a [`MeterRegistry`](crate::registry::MeterRegistry) while
/// registering or updating a meter.
///
/// These never reach the caller of an instrumented method: the engines log
/// them at `warn` and fall back to a safe default.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Meter name was empty or otherwise unusable.
    #[error("invalid meter name: {0:?}")]
    InvalidName(String),

    /// A meter with the same id is already registered with another type.
    #[error("meter {name} is already registered as a {existing}")]
    TypeConflict { name: String, existing: &'static str },

    /// A long-task id that was never started, or was already stopped.
    #[error("unknown long task {task} on {name}")]
    UnknownTask { name: String, task: u64 },

    /// The backend refused the operation.
    #[error("metrics backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A business error carrying a machine-readable error code.
///
/// Instrumented methods may return this directly, and the outcome classifier
/// will tag failures with its `error_code`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("[{error_code}] {message}")]
pub struct MetricHandlerError {
    error_code: String,
    message: String,
}

impl MetricHandlerError {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl HasErrorCode for MetricHandlerError {
    fn error_code(&self) -> &str {
        &self.error_code
    }
}

impl Classify for MetricHandlerError {
    fn as_error_code(&self) -> Option<&dyn HasErrorCode> {
        Some(self)
    }
}
