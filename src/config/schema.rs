//! Configuration schema definitions.
//!
//! This module defines the instrumentation configuration: logging, exporter
//! settings, and the per-method markers. All types derive Serde traits for
//! deserialization from TOML.
//!
//! ```toml
//! [[methods]]
//! method = "orders::OrderService::place"
//!
//! [methods.time]
//! name = "orders.place.timer"
//! tags = ["region", "eu"]
//! publish_percentiles = true
//! percentiles = [0.5, 0.99]
//!
//! [methods.count]
//! name = "orders.place.count"
//! count_failures_only = true
//! ```

use serde::{Deserialize, Serialize};

use crate::spec::{
    MetricSpec, Tags, TimeUnit, DEFAULT_COUNTER_NAME, DEFAULT_GAUGE_NAME, DEFAULT_LOG_TEMPLATE,
    DEFAULT_TIMER_NAME,
};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Metrics backend settings.
    pub exporter: ExporterConfig,

    /// Instrumented methods and their markers.
    pub methods: Vec<MethodMarkers>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Which registry measurements are published to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    /// In-process registry, inspectable after the fact.
    #[default]
    Memory,
    /// Global `metrics` recorder rendered in Prometheus text format.
    Prometheus,
}

/// Exporter configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub registry: RegistryKind,

    /// Quantiles rendered for every timer by the Prometheus recorder.
    pub quantiles: Vec<f64>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            registry: RegistryKind::Memory,
            quantiles: vec![0.5, 0.9, 0.95, 0.99],
        }
    }
}

/// Point-in-time or long-task timer marker.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeMarker {
    pub name: String,
    pub tags: Tags,
    pub long_task: bool,
    pub percentiles: Vec<f64>,
    pub publish_percentiles: bool,
    pub enable_custom_logging: bool,
    pub timer_unit: TimeUnit,
    /// Log line with a `{}` placeholder for the duration.
    pub log_template: String,
}

impl Default for TimeMarker {
    fn default() -> Self {
        Self {
            name: DEFAULT_TIMER_NAME.to_string(),
            tags: Tags::new(),
            long_task: false,
            percentiles: Vec::new(),
            publish_percentiles: false,
            enable_custom_logging: false,
            timer_unit: TimeUnit::Milliseconds,
            log_template: DEFAULT_LOG_TEMPLATE.to_string(),
        }
    }
}

/// Outcome counter marker.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CountMarker {
    pub name: String,
    pub description: Option<String>,
    pub tags: Tags,
    pub count_failures_only: bool,
}

impl Default for CountMarker {
    fn default() -> Self {
        Self {
            name: DEFAULT_COUNTER_NAME.to_string(),
            description: None,
            tags: Tags::new(),
            count_failures_only: false,
        }
    }
}

/// In-flight gauge marker.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GaugeMarker {
    pub name: String,
    pub tags: Tags,
}

impl Default for GaugeMarker {
    fn default() -> Self {
        Self {
            name: DEFAULT_GAUGE_NAME.to_string(),
            tags: Tags::new(),
        }
    }
}

/// Composite marker enabling several meters at once.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsMarker {
    pub timer: String,
    pub gauge: String,
    pub count: String,
    pub enable_timer: bool,
    pub enable_gauge: bool,
    pub enable_counter: bool,
    pub tags: Tags,
}

impl Default for MetricsMarker {
    fn default() -> Self {
        Self {
            timer: DEFAULT_TIMER_NAME.to_string(),
            gauge: DEFAULT_GAUGE_NAME.to_string(),
            count: DEFAULT_COUNTER_NAME.to_string(),
            enable_timer: true,
            enable_gauge: true,
            enable_counter: true,
            tags: Tags::new(),
        }
    }
}

/// Markers attached to one method.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MethodMarkers {
    /// Method key, `Type::method`.
    pub method: String,
    pub metrics: Option<MetricsMarker>,
    pub time: Option<TimeMarker>,
    pub count: Option<CountMarker>,
    pub gauge: Option<GaugeMarker>,
}

impl MethodMarkers {
    /// Merge the markers into one spec.
    ///
    /// The composite marker applies first; `time`, `count` and `gauge` then
    /// override its names and enable their meter. Composite tags reach every
    /// meter, while a single-meter marker's tags stay on its own meter.
    pub fn resolve(&self) -> MetricSpec {
        let mut spec = MetricSpec::default();

        if let Some(m) = &self.metrics {
            spec.name = m.timer.clone();
            spec.counter_name = Some(m.count.clone());
            spec.gauge_name = Some(m.gauge.clone());
            spec.enable_timer = m.enable_timer;
            spec.enable_counter = m.enable_counter;
            spec.enable_gauge = m.enable_gauge;
            spec.timer_tags.extend(&m.tags);
            spec.counter_tags.extend(&m.tags);
            spec.gauge_tags.extend(&m.tags);
        }

        if let Some(t) = &self.time {
            spec.name = t.name.clone();
            spec.enable_timer = true;
            spec.long_task = t.long_task;
            spec.percentiles = t.percentiles.clone();
            spec.publish_percentiles = t.publish_percentiles;
            spec.enable_custom_logging = t.enable_custom_logging;
            spec.timer_unit = t.timer_unit;
            spec.log_template = t.log_template.clone();
            spec.timer_tags.extend(&t.tags);
        }

        if let Some(c) = &self.count {
            spec.counter_name = Some(c.name.clone());
            spec.description = c.description.clone();
            spec.enable_counter = true;
            spec.count_failures_only = c.count_failures_only;
            spec.counter_tags.extend(&c.tags);
        }

        if let Some(g) = &self.gauge {
            spec.gauge_name = Some(g.name.clone());
            spec.enable_gauge = true;
            spec.gauge_tags.extend(&g.tags);
        }

        spec
    }
}
