//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::InstrumentationConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<InstrumentationConfig, ConfigError> {
    let config: InstrumentationConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<InstrumentationConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogFormat, RegistryKind};

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            [observability]
            log_level = "debug"
            log_format = "json"

            [exporter]
            registry = "prometheus"
            quantiles = [0.5, 0.99]

            [[methods]]
            method = "Orders::place"
            [methods.time]
            name = "orders.place"
            timer_unit = "seconds"

            [[methods]]
            method = "Orders::cancel"
            [methods.count]
            name = "orders.cancel"
            "#,
        )
        .unwrap();

        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.exporter.registry, RegistryKind::Prometheus);
        assert_eq!(config.methods.len(), 2);
        assert_eq!(config.methods[1].resolve().counter_name(), "orders.cancel");
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("methods = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_message() {
        let err = parse_config(
            r#"
            [[methods]]
            method = "Orders::place"
            [methods.time]
            percentiles = [2.0]
            "#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: method Orders::place has percentile 2 outside [0, 1]"
        );
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/method-metrics.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
