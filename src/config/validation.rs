//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check method keys are present and unique
//! - Validate resolved specs: names, percentiles, tags, log template
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the config
//! - Runs before a config is accepted into the catalog

use std::borrow::Cow;
use std::collections::HashSet;
use std::str::FromStr;

use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::config::schema::InstrumentationConfig;
use crate::instrument::counter::RESERVED_TAGS;
use crate::spec::MetricSpec;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("methods[{0}] has an empty method key")]
    EmptyMethod(usize),

    #[error("method {0} is configured more than once")]
    DuplicateMethod(String),

    #[error("method {method} enables no meter")]
    NoMeters { method: String },

    #[error("method {method} has an empty {meter} name")]
    EmptyMetricName { method: String, meter: &'static str },

    #[error("method {method} has percentile {value} outside [0, 1]")]
    PercentileOutOfRange { method: String, value: f64 },

    #[error("method {method} publishes its {first} and {second} under the same name {name}")]
    SharedMetricName {
        method: String,
        first: &'static str,
        second: &'static str,
        name: String,
    },

    #[error("method {method} repeats tag {key}")]
    DuplicateTag { method: String, key: String },

    #[error("method {method} uses reserved counter tag {key}")]
    ReservedTag { method: String, key: String },

    #[error("method {method} enables custom logging but its template has no {{}} placeholder")]
    MissingPlaceholder { method: String },

    #[error("invalid log level {0:?}")]
    InvalidLogLevel(String),

    #[error("exporter quantile {0} outside [0, 1]")]
    QuantileOutOfRange(f64),
}

/// Validate the whole configuration.
pub fn validate_config(config: &InstrumentationConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if LevelFilter::from_str(&config.observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(config.observability.log_level.clone()));
    }
    for &q in &config.exporter.quantiles {
        if !(0.0..=1.0).contains(&q) {
            errors.push(ValidationError::QuantileOutOfRange(q));
        }
    }

    let mut seen = HashSet::new();
    for (index, markers) in config.methods.iter().enumerate() {
        let method = markers.method.trim();
        if method.is_empty() {
            errors.push(ValidationError::EmptyMethod(index));
            continue;
        }
        if !seen.insert(method) {
            errors.push(ValidationError::DuplicateMethod(method.to_string()));
        }
        errors.extend(validate_spec(method, &markers.resolve()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one resolved spec, returning every problem found.
pub fn validate_spec(method: &str, spec: &MetricSpec) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let method = method.to_string();

    if !spec.is_active() {
        errors.push(ValidationError::NoMeters { method: method.clone() });
    }

    let names = [
        (spec.enable_timer, "timer", Cow::Borrowed(spec.name.as_str())),
        (spec.enable_counter, "counter", spec.counter_name()),
        (spec.enable_gauge, "gauge", spec.gauge_name()),
    ];
    let enabled: Vec<_> = names
        .into_iter()
        .filter(|(enabled, _, _)| *enabled)
        .map(|(_, meter, name)| (meter, name))
        .collect();
    for (i, &(meter, ref name)) in enabled.iter().enumerate() {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyMetricName {
                method: method.clone(),
                meter,
            });
            continue;
        }
        // Each meter kind must own its name in the registry.
        if let Some(&(first, _)) = enabled[..i].iter().find(|(_, other)| other == name) {
            errors.push(ValidationError::SharedMetricName {
                method: method.clone(),
                first,
                second: meter,
                name: name.to_string(),
            });
        }
    }

    for &value in &spec.percentiles {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ValidationError::PercentileOutOfRange {
                method: method.clone(),
                value,
            });
        }
    }

    if spec.enable_counter {
        for tag in &spec.counter_tags {
            if RESERVED_TAGS.contains(&tag.key.as_str()) {
                errors.push(ValidationError::ReservedTag {
                    method: method.clone(),
                    key: tag.key.clone(),
                });
            }
        }
    }

    let mut repeated = HashSet::new();
    for tags in [&spec.timer_tags, &spec.counter_tags, &spec.gauge_tags] {
        let mut keys = HashSet::new();
        for tag in tags {
            if !keys.insert(tag.key.as_str()) && repeated.insert(tag.key.as_str()) {
                errors.push(ValidationError::DuplicateTag {
                    method: method.clone(),
                    key: tag.key.clone(),
                });
            }
        }
    }

    if spec.enable_custom_logging && !spec.log_template.contains("{}") {
        errors.push(ValidationError::MissingPlaceholder { method });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CountMarker, MethodMarkers, TimeMarker};
    use crate::spec::Tags;

    fn method(key: &str) -> MethodMarkers {
        MethodMarkers {
            method: key.into(),
            time: Some(TimeMarker::default()),
            ..MethodMarkers::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&InstrumentationConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = InstrumentationConfig::default();
        config.observability.log_level = "loud".into();
        config.methods.push(method(""));
        config.methods.push(method("Svc::a"));
        config.methods.push(method("Svc::a"));
        config.methods.push(MethodMarkers {
            method: "Svc::idle".into(),
            ..MethodMarkers::default()
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidLogLevel("loud".into())));
        assert!(errors.contains(&ValidationError::EmptyMethod(0)));
        assert!(errors.contains(&ValidationError::DuplicateMethod("Svc::a".into())));
        assert!(errors.contains(&ValidationError::NoMeters { method: "Svc::idle".into() }));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_spec_problems() {
        let mut spec = MetricSpec::timer("").with_percentiles(vec![0.5, 1.5]);
        spec.enable_custom_logging = true;
        spec.log_template = "done".into();
        let errors = validate_spec("Svc::op", &spec);
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], ValidationError::EmptyMetricName { meter: "timer", .. }));
        assert!(matches!(errors[1], ValidationError::PercentileOutOfRange { value, .. } if value == 1.5));
        assert!(matches!(errors[2], ValidationError::MissingPlaceholder { .. }));
    }

    #[test]
    fn test_reserved_and_duplicate_tags() {
        let markers = MethodMarkers {
            method: "Svc::op".into(),
            count: Some(CountMarker {
                tags: Tags::from_pairs(["result", "x", "zone", "a", "zone", "b"]).unwrap(),
                ..CountMarker::default()
            }),
            ..MethodMarkers::default()
        };
        let errors = validate_spec("Svc::op", &markers.resolve());
        assert_eq!(
            errors,
            vec![
                ValidationError::ReservedTag {
                    method: "Svc::op".into(),
                    key: "result".into()
                },
                ValidationError::DuplicateTag {
                    method: "Svc::op".into(),
                    key: "zone".into()
                },
            ]
        );
    }

    #[test]
    fn test_timer_and_gauge_without_names_are_valid() {
        let mut spec = MetricSpec::timer("svc.op");
        spec.enable_gauge = true;
        assert!(validate_spec("Svc::op", &spec).is_empty());
    }

    #[test]
    fn test_meters_sharing_a_name_rejected() {
        let spec = MetricSpec::timer("svc.op").with_gauge("svc.op");
        assert_eq!(
            validate_spec("Svc::op", &spec),
            vec![ValidationError::SharedMetricName {
                method: "Svc::op".into(),
                first: "timer",
                second: "gauge",
                name: "svc.op".into(),
            }]
        );

        let spec = MetricSpec::timer("svc.op").with_counter("svc.op");
        assert!(matches!(
            validate_spec("Svc::op", &spec)[..],
            [ValidationError::SharedMetricName { first: "timer", second: "counter", .. }]
        ));
    }

    #[test]
    fn test_count_tags_checked_apart_from_timer_tags() {
        let markers = MethodMarkers {
            method: "Svc::op".into(),
            time: Some(TimeMarker {
                tags: Tags::from_pairs(["result", "fast"]).unwrap(),
                ..TimeMarker::default()
            }),
            count: Some(CountMarker {
                tags: Tags::from_pairs(["zone", "a"]).unwrap(),
                ..CountMarker::default()
            }),
            ..MethodMarkers::default()
        };
        assert!(validate_spec("Svc::op", &markers.resolve()).is_empty());
    }
}
