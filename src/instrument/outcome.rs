//! Outcome classification.
//!
//! Turns a failed invocation into the categorical tags the counter publishes:
//! the failure's kind and its error code. Error codes are read through the
//! [`HasErrorCode`] capability; failures without it are tagged `"none"`.
//!
//! Classification never fails and never panics.

use std::borrow::Cow;

/// Tag value used when a failure has no error code, and for success.
pub const NONE_TAG_VALUE: &str = "none";

/// Exception kind used for invocations that unwound by panicking.
pub const PANIC_KIND: &str = "panic";

/// Capability of failures that carry a machine-readable error code.
pub trait HasErrorCode {
    fn error_code(&self) -> &str;
}

/// Failure types that can be tagged by the classifier.
///
/// Both methods have defaults, so `impl Classify for MyError {}` is enough
/// to tag failures with the short type name and `error.code=none`.
pub trait Classify {
    /// Kind name used for the `exception` tag.
    ///
    /// Defaults to the unqualified type name. Enums usually override this to
    /// name the variant.
    fn kind(&self) -> Cow<'_, str> {
        Cow::Borrowed(short_type_name(std::any::type_name::<Self>()))
    }

    /// The error code capability, when this failure carries one.
    fn as_error_code(&self) -> Option<&dyn HasErrorCode> {
        None
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn kind(&self) -> Cow<'_, str> {
        (**self).kind()
    }

    fn as_error_code(&self) -> Option<&dyn HasErrorCode> {
        (**self).as_error_code()
    }
}

impl<T: Classify + ?Sized> Classify for std::sync::Arc<T> {
    fn kind(&self) -> Cow<'_, str> {
        (**self).kind()
    }

    fn as_error_code(&self) -> Option<&dyn HasErrorCode> {
        (**self).as_error_code()
    }
}

impl Classify for std::io::Error {
    fn kind(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{:?}", std::io::Error::kind(self)))
    }
}

impl Classify for std::fmt::Error {}

/// Strip module paths and generic arguments from a type name.
///
/// `my_crate::errors::Wrapper<alloc::string::String>` becomes `Wrapper`.
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Tags describing a failed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FailureTags {
    pub exception_kind: String,
    pub error_code: String,
}

impl FailureTags {
    pub fn new(exception_kind: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            exception_kind: exception_kind.into(),
            error_code: error_code.into(),
        }
    }

    /// Tags for an invocation that panicked instead of returning.
    pub fn panic() -> Self {
        Self::new(PANIC_KIND, NONE_TAG_VALUE)
    }
}

/// Settled state of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(FailureTags),
}

impl Outcome {
    /// Classify a settled result.
    pub fn of<T, E: Classify>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(e) => Outcome::Failure(classify(e)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Derive the `exception` and `error.code` tags for `failure`.
///
/// The kind is always the failure's own kind; wrapped causes are not
/// inspected, so synchronous and deferred failures are tagged the same way.
pub fn classify<E: Classify + ?Sized>(failure: &E) -> FailureTags {
    let exception_kind = failure.kind().into_owned();
    let error_code = match failure.as_error_code() {
        Some(capability) => capability.error_code().to_string(),
        None => {
            tracing::warn!(exception = %exception_kind, "No error code on failure kind");
            NONE_TAG_VALUE.to_string()
        }
    };
    FailureTags {
        exception_kind,
        error_code,
    }
}
