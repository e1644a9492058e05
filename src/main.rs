//! method-metrics demo
//!
//! Drives a small order service through the instrumentation dispatcher and
//! prints what was published.
//!
//! # Architecture Overview
//!
//! ```text
//!   config (TOML) ──▶ loader ──▶ SpecCatalog ◀── ConfigWatcher (--watch)
//!                                     │
//!                                     ▼ Arc<MetricSpec> per method
//!   OrderService::place ──▶ ┌──────────────────┐
//!   OrderService::ship  ──▶ │    Dispatcher    │──▶ MeterRegistry
//!                           │ timer / counter  │      ├─ InMemoryRegistry ──▶ JSON snapshot
//!                           │ gauge / outcome  │      └─ FacadeRegistry   ──▶ Prometheus text
//!                           └──────────────────┘
//! ```

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures_util::future::join_all;
use thiserror::Error;

use method_metrics::config::{load_config, parse_config, ConfigWatcher, InstrumentationConfig, RegistryKind};
use method_metrics::instrument::{Classify, HasErrorCode, InvocationContext, MethodSignature, Proceeded};
use method_metrics::observability::{init_logging, install_prometheus_recorder};
use method_metrics::registry::{FacadeRegistry, InMemoryRegistry, MeterRegistry};
use method_metrics::{Dispatcher, SpecCatalog};

const DEMO_CONFIG: &str = r#"
[observability]
log_level = "info"

[[methods]]
method = "OrderService::place"
[methods.metrics]
count = "orders.place.count"
gauge = "orders.place.active"
tags = ["service", "orders"]
[methods.time]
name = "orders.place.timer"
publish_percentiles = true
percentiles = [0.5, 0.95]
enable_custom_logging = true
log_template = "Order placed in {}"
timer_unit = "microseconds"

[[methods]]
method = "OrderService::ship"
[methods.time]
name = "orders.ship.timer"
long_task = true
[methods.count]
name = "orders.ship.failures"
count_failures_only = true
"#;

#[derive(Parser)]
#[command(name = "method-metrics")]
#[command(about = "Run instrumented sample invocations and print the published metrics", long_about = None)]
struct Cli {
    /// Instrumentation config file. The built-in demo config is used when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Invocations per method.
    #[arg(short = 'n', long, default_value_t = 10)]
    iterations: u32,

    /// Registry override (memory or prometheus).
    #[arg(short, long)]
    registry: Option<String>,

    /// Keep running and apply config file changes until Ctrl-C.
    #[arg(short, long)]
    watch: bool,
}

#[derive(Debug, Error)]
enum OrderError {
    #[error("order {0} rejected: out of stock")]
    OutOfStock(u32),
    #[error("carrier unavailable")]
    CarrierUnavailable,
}

impl HasErrorCode for OrderError {
    fn error_code(&self) -> &str {
        match self {
            OrderError::OutOfStock(_) => "ORD-001",
            OrderError::CarrierUnavailable => "SHP-503",
        }
    }
}

impl Classify for OrderError {
    fn kind(&self) -> Cow<'_, str> {
        match self {
            OrderError::OutOfStock(_) => Cow::Borrowed("OutOfStock"),
            OrderError::CarrierUnavailable => Cow::Borrowed("CarrierUnavailable"),
        }
    }

    fn as_error_code(&self) -> Option<&dyn HasErrorCode> {
        Some(self)
    }
}

fn place_order(id: u32) -> Result<u32, OrderError> {
    std::thread::sleep(Duration::from_millis(u64::from(id % 3)));
    if id % 4 == 3 {
        Err(OrderError::OutOfStock(id))
    } else {
        Ok(id)
    }
}

async fn ship_order(id: u32) -> Result<u32, OrderError> {
    tokio::time::sleep(Duration::from_millis(5 + u64::from(id % 5) * 3)).await;
    if id % 5 == 4 {
        Err(OrderError::CarrierUnavailable)
    } else {
        Ok(id)
    }
}

enum Output {
    Memory(Arc<InMemoryRegistry>),
    Prometheus(metrics_exporter_prometheus::PrometheusHandle),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config: InstrumentationConfig = match &cli.config {
        Some(path) => load_config(path)?,
        None => parse_config(DEMO_CONFIG)?,
    };
    if let Some(registry) = &cli.registry {
        config.exporter.registry = match registry.as_str() {
            "memory" => RegistryKind::Memory,
            "prometheus" => RegistryKind::Prometheus,
            other => return Err(format!("unknown registry {other:?}").into()),
        };
    }

    init_logging(&config.observability)?;
    tracing::info!("method-metrics v0.1.0 starting");

    let (registry, output): (Arc<dyn MeterRegistry>, Output) = match config.exporter.registry {
        RegistryKind::Memory => {
            let registry = Arc::new(InMemoryRegistry::new());
            let shared: Arc<dyn MeterRegistry> = registry.clone();
            (shared, Output::Memory(registry))
        }
        RegistryKind::Prometheus => {
            let handle = install_prometheus_recorder(&config.exporter)?;
            (Arc::new(FacadeRegistry::new()), Output::Prometheus(handle))
        }
    };

    let catalog = Arc::new(SpecCatalog::from_config(&config));
    tracing::info!(methods = ?catalog.methods(), "Configuration loaded");

    let dispatcher = Dispatcher::new(registry);
    run_round(&dispatcher, &catalog, cli.iterations).await;
    print_output(&output)?;

    if cli.watch {
        let Some(path) = &cli.config else {
            return Err("--watch needs --config".into());
        };
        let (watcher, updates) = ConfigWatcher::new(path);
        let _guard = watcher.run()?;
        let follower = {
            let catalog = catalog.clone();
            tokio::spawn(async move { catalog.follow(updates).await })
        };

        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_round(&dispatcher, &catalog, cli.iterations).await;
                    print_output(&output)?;
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        follower.abort();
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_round(dispatcher: &Dispatcher, catalog: &SpecCatalog, iterations: u32) {
    let place = MethodSignature::new("OrderService", "place");
    let ship = MethodSignature::new("OrderService", "ship");

    let mut placed = 0;
    for id in 0..iterations {
        let result = match catalog.resolve(&place) {
            Some(spec) => {
                let ctx = InvocationContext::immediate(place.clone(), || place_order(id));
                match dispatcher.around(ctx, spec) {
                    Proceeded::Immediate(result) => result,
                    Proceeded::Deferred(measured) => measured.await,
                }
            }
            None => place_order(id),
        };
        if result.is_ok() {
            placed += 1;
        }
    }

    let shipments = (0..iterations).map(|id| {
        let spec = catalog.resolve(&ship);
        let ship = ship.clone();
        async move {
            match spec {
                Some(spec) => match dispatcher.around(InvocationContext::deferred(ship, ship_order(id)), spec) {
                    Proceeded::Immediate(result) => result,
                    Proceeded::Deferred(measured) => measured.await,
                },
                None => ship_order(id).await,
            }
        }
    });
    let shipped = join_all(shipments).await.into_iter().filter(Result::is_ok).count();

    tracing::info!(placed, shipped, iterations, "Round complete");
}

fn print_output(output: &Output) -> Result<(), serde_json::Error> {
    match output {
        Output::Memory(registry) => println!("{}", serde_json::to_string_pretty(&registry.snapshot())?),
        Output::Prometheus(handle) => println!("{}", handle.render()),
    }
    Ok(())
}
