//! Counter engine.
//!
//! Every increment carries the same fixed tag layout, outcome tags first:
//!
//! ```text
//! exception=<kind|none>, result=<success|failure>, error.code=<code|none>, <spec tags...>
//! ```

use std::sync::Arc;

use super::outcome::{FailureTags, Outcome, NONE_TAG_VALUE};
use crate::registry::{MeterId, MeterRegistry};
use crate::spec::{MetricSpec, Tags};

pub const RESULT_TAG: &str = "result";
pub const EXCEPTION_TAG: &str = "exception";
pub const ERROR_CODE_TAG: &str = "error.code";

pub const RESULT_SUCCESS: &str = "success";
pub const RESULT_FAILURE: &str = "failure";

/// Tag keys the counter owns; user tags may not reuse them.
pub const RESERVED_TAGS: [&str; 3] = [EXCEPTION_TAG, RESULT_TAG, ERROR_CODE_TAG];

/// Produces outcome-tagged increments against a shared registry.
#[derive(Clone)]
pub struct CounterEngine {
    registry: Arc<dyn MeterRegistry>,
}

impl CounterEngine {
    pub fn new(registry: Arc<dyn MeterRegistry>) -> Self {
        Self { registry }
    }

    /// Count a successful call, unless the spec counts failures only.
    pub fn record_success(&self, spec: &MetricSpec) {
        if spec.count_failures_only {
            return;
        }
        self.record(spec, NONE_TAG_VALUE, RESULT_SUCCESS, NONE_TAG_VALUE);
    }

    /// Count a failed call. Always recorded.
    pub fn record_failure(&self, spec: &MetricSpec, failure: &FailureTags) {
        self.record(spec, &failure.exception_kind, RESULT_FAILURE, &failure.error_code);
    }

    pub fn record_outcome(&self, spec: &MetricSpec, outcome: &Outcome) {
        match outcome {
            Outcome::Success => self.record_success(spec),
            Outcome::Failure(failure) => self.record_failure(spec, failure),
        }
    }

    fn record(&self, spec: &MetricSpec, exception: &str, result: &str, error_code: &str) {
        let mut tags = Tags::new();
        tags.push(EXCEPTION_TAG, exception);
        tags.push(RESULT_TAG, result);
        tags.push(ERROR_CODE_TAG, error_code);
        tags.extend(&spec.counter_tags);

        let name = spec.counter_name();
        let id = MeterId::new(name.as_ref(), &tags);
        let incremented = self
            .registry
            .counter(&id, spec.description.as_deref())
            .and_then(|counter| counter.increment(1));

        if let Err(e) = incremented {
            tracing::warn!(metric = %name, result, error = %e, "Error incrementing counter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;

    fn outcome_id(name: &str, exception: &str, result: &str, code: &str, extra: &Tags) -> MeterId {
        let mut tags = Tags::from_pairs([EXCEPTION_TAG, exception, RESULT_TAG, result, ERROR_CODE_TAG, code]).unwrap();
        tags.extend(extra);
        MeterId::new(name, &tags)
    }

    #[test]
    fn test_success_tags() {
        let registry = Arc::new(InMemoryRegistry::new());
        let engine = CounterEngine::new(registry.clone());
        let spec = MetricSpec::counter("logins").with_tag("region", "eu");

        engine.record_success(&spec);
        engine.record_success(&spec);

        let id = outcome_id("logins", "none", "success", "none", &spec.counter_tags);
        assert_eq!(registry.counter_value(&id), Some(2));
        assert_eq!(id.tags.last().map(|t| t.key.as_str()), Some("region"));
    }

    #[test]
    fn test_failures_only_skips_success() {
        let registry = Arc::new(InMemoryRegistry::new());
        let engine = CounterEngine::new(registry.clone());
        let spec = MetricSpec::counter("logins").failures_only();

        engine.record_success(&spec);
        assert_eq!(registry.counter_total("logins"), 0);

        engine.record_failure(&spec, &FailureTags::new("Locked", "E401"));
        let id = outcome_id("logins", "Locked", "failure", "E401", &spec.counter_tags);
        assert_eq!(registry.counter_value(&id), Some(1));
    }

    #[test]
    fn test_counter_name_override() {
        let registry = Arc::new(InMemoryRegistry::new());
        let engine = CounterEngine::new(registry.clone());
        let spec = MetricSpec::timer("logins.time").with_counter("logins.count");

        engine.record_outcome(&spec, &Outcome::Success);
        assert_eq!(registry.counter_total("logins.count"), 1);
        assert_eq!(registry.counter_total("logins.time"), 0);
    }

    #[test]
    fn test_counter_tags_stay_on_counter() {
        let registry = Arc::new(InMemoryRegistry::new());
        let engine = CounterEngine::new(registry.clone());
        let spec = MetricSpec::counter("logins").with_counter_tag("only", "counter");

        engine.record_success(&spec);
        let id = outcome_id("logins", "none", "success", "none", &spec.counter_tags);
        assert_eq!(id.tag("only"), Some("counter"));
        assert_eq!(registry.counter_value(&id), Some(1));
    }

    #[test]
    fn test_registry_error_is_swallowed() {
        let registry = Arc::new(InMemoryRegistry::new());
        let engine = CounterEngine::new(registry.clone());
        let spec = MetricSpec::counter("");

        engine.record_failure(&spec, &FailureTags::panic());
        assert!(registry.is_empty());
    }
}
