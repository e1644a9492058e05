//! In-flight invocation gauge.
//!
//! Raised by one when an invocation starts and lowered when it settles, so
//! the gauge reads the number of calls currently running.

use std::sync::Arc;

use crate::registry::{Gauge, MeterId, MeterRegistry};
use crate::spec::MetricSpec;

/// An in-flight slot held on a gauge.
#[must_use = "an in-flight slot must be released"]
pub struct InFlight {
    gauge: Arc<dyn Gauge>,
}

#[derive(Clone)]
pub struct GaugeEngine {
    registry: Arc<dyn MeterRegistry>,
}

impl GaugeEngine {
    pub fn new(registry: Arc<dyn MeterRegistry>) -> Self {
        Self { registry }
    }

    pub fn enter(&self, spec: &MetricSpec) -> Option<InFlight> {
        let name = spec.gauge_name();
        let id = MeterId::new(name.as_ref(), &spec.gauge_tags);
        let entered = self
            .registry
            .gauge(&id)
            .and_then(|gauge| gauge.increment(1.0).map(|()| InFlight { gauge }));

        match entered {
            Ok(slot) => Some(slot),
            Err(e) => {
                tracing::warn!(metric = %name, error = %e, "Error raising in-flight gauge");
                None
            }
        }
    }

    pub fn exit(&self, slot: InFlight, spec: &MetricSpec) {
        if let Err(e) = slot.gauge.decrement(1.0) {
            tracing::warn!(metric = %spec.gauge_name(), error = %e, "Error lowering in-flight gauge");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;

    #[test]
    fn test_enter_and_exit() {
        let registry = Arc::new(InMemoryRegistry::new());
        let engine = GaugeEngine::new(registry.clone());
        let spec = MetricSpec::default().with_gauge("jobs.active");
        let id = MeterId::new("jobs.active", &spec.gauge_tags);

        let a = engine.enter(&spec).unwrap();
        let b = engine.enter(&spec).unwrap();
        assert_eq!(registry.gauge_value(&id), Some(2.0));

        engine.exit(a, &spec);
        engine.exit(b, &spec);
        assert_eq!(registry.gauge_value(&id), Some(0.0));
    }
}
