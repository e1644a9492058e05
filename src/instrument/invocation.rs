//! The intercepted call as handed over by the interceptor.

use std::fmt;
use std::future::{Future, Ready};

use super::measured::Measured;

/// Identity of the instrumented method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub declaring_type: String,
    pub name: String,
}

impl MethodSignature {
    pub fn new(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
        }
    }

    /// Parse `Type::method`. A bare name has an empty declaring type.
    pub fn parse(key: &str) -> Self {
        match key.rsplit_once("::") {
            Some((declaring_type, name)) => Self::new(declaring_type, name),
            None => Self::new("", key),
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.declaring_type.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}::{}", self.declaring_type, self.name)
        }
    }
}

/// How the real method completes.
pub enum Proceed<F, Fut> {
    /// A blocking call returning its result directly.
    Immediate(F),
    /// A deferred result that settles later.
    Deferred(Fut),
}

/// One intercepted call.
pub struct InvocationContext<F, Fut> {
    pub method: MethodSignature,
    pub proceed: Proceed<F, Fut>,
}

/// Placeholder closure type for deferred contexts.
pub type NeverCalled<T, E> = fn() -> Result<T, E>;

impl<F, T, E> InvocationContext<F, Ready<Result<T, E>>>
where
    F: FnOnce() -> Result<T, E>,
{
    pub fn immediate(method: MethodSignature, call: F) -> Self {
        Self {
            method,
            proceed: Proceed::Immediate(call),
        }
    }
}

impl<Fut, T, E> InvocationContext<NeverCalled<T, E>, Fut>
where
    Fut: Future<Output = Result<T, E>>,
{
    pub fn deferred(method: MethodSignature, future: Fut) -> Self {
        Self {
            method,
            proceed: Proceed::Deferred(future),
        }
    }
}

/// What the dispatcher hands back to the interceptor.
pub enum Proceeded<T, E, Fut> {
    /// The real call's own result.
    Immediate(Result<T, E>),
    /// The caller's deferred result with completion handling attached.
    Deferred(Measured<Fut>),
}

impl<T, E, Fut> Proceeded<T, E, Fut>
where
    Fut: Future<Output = Result<T, E>>,
{
    pub fn is_deferred(&self) -> bool {
        matches!(self, Proceeded::Deferred(_))
    }

    pub fn into_immediate(self) -> Option<Result<T, E>> {
        match self {
            Proceeded::Immediate(result) => Some(result),
            Proceeded::Deferred(_) => None,
        }
    }

    pub fn into_deferred(self) -> Option<Measured<Fut>> {
        match self {
            Proceeded::Immediate(_) => None,
            Proceeded::Deferred(measured) => Some(measured),
        }
    }
}
