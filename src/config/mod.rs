//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → InstrumentationConfig (validated, immutable)
//!     → catalog.rs (markers resolved once per method into Arc<MetricSpec>)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → catalog.rs swaps the spec map atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod catalog;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use catalog::SpecCatalog;
pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CountMarker, ExporterConfig, GaugeMarker, InstrumentationConfig, LogFormat, MethodMarkers, MetricsMarker,
    ObservabilityConfig, RegistryKind, TimeMarker,
};
pub use watcher::ConfigWatcher;
