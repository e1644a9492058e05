//! Prometheus recorder for the `metrics` facade.
//!
//! Only the recorder is set up here; rendering the text exposition is left to
//! the caller through the returned handle. No listener is bound.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::config::ExporterConfig;

/// Build a recorder with the configured quantiles, without installing it.
pub fn build_prometheus_recorder(config: &ExporterConfig) -> Result<PrometheusRecorder, BuildError> {
    Ok(PrometheusBuilder::new().set_quantiles(&config.quantiles)?.build_recorder())
}

/// Install a Prometheus recorder as the global `metrics` recorder.
pub fn install_prometheus_recorder(config: &ExporterConfig) -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_quantiles(&config.quantiles)?
        .install_recorder()?;
    tracing::info!(quantiles = ?config.quantiles, "Prometheus recorder installed");
    Ok(handle)
}
