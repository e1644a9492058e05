//! Per-method spec cache.
//!
//! Markers are resolved once per method when a configuration is accepted;
//! invocations then fetch the shared `Arc<MetricSpec>` without locking.
//! Reloads swap the whole map atomically, so an invocation sees either the
//! old or the new spec, never a mix.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;

use crate::config::schema::InstrumentationConfig;
use crate::instrument::MethodSignature;
use crate::spec::MetricSpec;

type SpecMap = HashMap<String, Arc<MetricSpec>>;

/// Resolved specs keyed by `Type::method`.
pub struct SpecCatalog {
    specs: ArcSwap<SpecMap>,
}

impl SpecCatalog {
    pub fn new() -> Self {
        Self {
            specs: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn from_config(config: &InstrumentationConfig) -> Self {
        let catalog = Self::new();
        catalog.replace(config);
        catalog
    }

    /// Replace every entry with the markers of `config`.
    pub fn replace(&self, config: &InstrumentationConfig) {
        let specs: SpecMap = config
            .methods
            .iter()
            .map(|m| (m.method.trim().to_string(), Arc::new(m.resolve())))
            .collect();
        tracing::info!(methods = specs.len(), "Instrumentation catalog updated");
        self.specs.store(Arc::new(specs));
    }

    pub fn resolve(&self, method: &MethodSignature) -> Option<Arc<MetricSpec>> {
        self.get(&method.to_string())
    }

    pub fn get(&self, key: &str) -> Option<Arc<MetricSpec>> {
        self.specs.load().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.specs.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.load().is_empty()
    }

    /// Method keys, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.specs.load().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Apply configuration updates until the sender side closes.
    pub async fn follow(&self, mut updates: mpsc::UnboundedReceiver<InstrumentationConfig>) {
        while let Some(config) = updates.recv().await {
            self.replace(&config);
        }
        tracing::debug!("Configuration update channel closed");
    }
}

impl Default for SpecCatalog {
    fn default() -> Self {
        Self::new()
    }
}
